pub mod cache;
pub mod image;
pub mod job;
pub mod translation;

pub use cache::{CacheEntry, CacheType};
pub use image::{ImageFilters, ImageFormat, ImageSearchResult, ProcessOptions, ResizeOptions};
pub use job::{GenerateImageRequest, GenerationJob, JobEvent, JobStatus, RequestValidationError};
pub use translation::{DetectedLanguage, LanguageInfo, TranslationCacheEntry};

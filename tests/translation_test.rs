// 翻译服务集成测试
//
// 使用 wiremock 模拟翻译后端，验证短路、缓存与健康检查的调用次数

#[cfg(test)]
mod translation_tests {
    use presentation_backend::config::CacheTtlConfig;
    use presentation_backend::database::Database;
    use presentation_backend::external::{BackendError, LibreTranslateClient};
    use presentation_backend::services::{
        ContentCache, TranslationCache, TranslationError, TranslationService,
    };
    use serde_json::json;
    use wiremock::matchers::{any, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> (Database, TranslationService) {
        let database = Database::in_memory().await.unwrap();
        let pool = database.pool().clone();
        let service = TranslationService::new(
            LibreTranslateClient::new(server.uri()).unwrap(),
            ContentCache::new(pool.clone(), CacheTtlConfig::default()),
            TranslationCache::new(pool),
        );
        (database, service)
    }

    async fn mount_healthy(server: &MockServer, expected: u64) {
        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "code": "en", "name": "English" },
                { "code": "es", "name": "Spanish" }
            ])))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_short_circuits_make_no_backend_calls() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (_db, service) = service(&server).await;

        let same = service
            .translate("Hello world", "en", Some("en"))
            .await
            .unwrap();
        assert_eq!(same, "Hello world");

        let empty = service.translate("", "es", Some("en")).await.unwrap();
        assert_eq!(empty, "");

        let blank = service.translate("   ", "es", None).await.unwrap();
        assert_eq!(blank, "   ");
    }

    #[tokio::test]
    async fn test_translation_is_cached() {
        let server = MockServer::start().await;
        // 第二次调用命中缓存，不再做健康检查
        mount_healthy(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_partial_json(json!({
                "q": "Hello world",
                "source": "en",
                "target": "es",
                "format": "text"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "translatedText": "Hola mundo" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let (_db, service) = service(&server).await;

        for _ in 0..2 {
            let translated = service
                .translate("Hello world", "es", Some("en"))
                .await
                .unwrap();
            assert_eq!(translated, "Hola mundo");
        }
    }

    #[tokio::test]
    async fn test_auto_source_detects_then_short_circuits() {
        let server = MockServer::start().await;
        mount_healthy(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/detect"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "language": "en", "confidence": 92.0 }])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (_db, service) = service(&server).await;

        // 检测结果为英文，与目标语言相同，直接返回原文
        let result = service.translate("Good morning", "en", None).await.unwrap();
        assert_eq!(result, "Good morning");

        // 检测结果已缓存
        let detected = service.detect_language("Good morning").await.unwrap();
        assert_eq!(detected.language, "en");
    }

    #[tokio::test]
    async fn test_health_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let (_db, service) = service(&server).await;

        let result = service.translate("Hello", "fr", Some("en")).await;
        assert!(matches!(
            result,
            Err(TranslationError::Backend(BackendError::ServiceUnavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_backend_error_message_is_propagated() {
        let server = MockServer::start().await;
        mount_healthy(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "fr is not supported" })),
            )
            .mount(&server)
            .await;
        let (_db, service) = service(&server).await;

        match service.translate("Hello", "fr", Some("en")).await {
            Err(TranslationError::Backend(BackendError::Backend(message))) => {
                assert!(message.contains("fr is not supported"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        for (source, translated) in [("one", "uno"), ("two", "dos"), ("three", "tres")] {
            Mock::given(method("POST"))
                .and(path("/translate"))
                .and(body_partial_json(json!({ "q": source })))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "translatedText": translated })),
                )
                .mount(&server)
                .await;
        }
        let (_db, service) = service(&server).await;

        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let results = service.translate_batch(&texts, "es", Some("en")).await.unwrap();
        assert_eq!(results, vec!["uno", "dos", "tres"]);

        assert!(service.clear_cache().await.unwrap() >= 3);
    }

    #[tokio::test]
    async fn test_languages_fallback_when_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/languages"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let (_db, service) = service(&server).await;

        let languages = service.languages().await;
        assert!(languages.iter().any(|l| l.code == "en"));
        assert!(languages.iter().any(|l| l.code == "zh"));
    }
}

//! Blocking dispatch scenarios against stubbed vendor endpoints.

use quillgate::{
    Attachment, ConversationTurn, Error, Gateway, GeminiProvider, GenerationRequest, Mode,
    ModelKind, OpenAIProvider,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> Gateway {
    Gateway::with_providers(
        GeminiProvider::with_base_url(server.uri()).unwrap(),
        OpenAIProvider::with_base_url(server.uri()).unwrap(),
    )
}

async fn captured_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn test_gemini_text_generation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "Hi there"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let result = gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap();

    assert_eq!(result.into_text().unwrap().text, "Hi there");
}

#[tokio::test]
async fn test_openai_text_generation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Hi there"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let result = gateway_for(&server)
        .dispatch("openai", &request, "test-key")
        .await
        .unwrap();

    assert_eq!(result.into_text().unwrap().text, "Hi there");
}

#[tokio::test]
async fn test_chatgpt_alias_routes_to_openai() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let result = gateway_for(&server)
        .dispatch("chatgpt", &request, "test-key")
        .await
        .unwrap();

    assert_eq!(result.into_text().unwrap().text, "ok");
}

#[tokio::test]
async fn test_vendor_error_envelope_becomes_upstream_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"message": "quota exceeded"}
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let err = gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamApi { ref message, .. } if message == "quota exceeded"));
}

#[tokio::test]
async fn test_non_2xx_with_envelope_becomes_upstream_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "rate limited", "type": "requests"}
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let err = gateway_for(&server)
        .dispatch("openai", &request, "test-key")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamApi { ref message, .. } if message == "rate limited"));
}

#[tokio::test]
async fn test_non_2xx_without_envelope_becomes_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("<html>Service Unavailable</html>"))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let err = gateway_for(&server)
        .dispatch("openai", &request, "test-key")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamHttp { status: 503, .. }));
}

#[tokio::test]
async fn test_2xx_with_unexpected_shape_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Hello");
    let err = gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_unknown_provider_makes_no_network_call() {
    let server = MockServer::start().await;

    let request = GenerationRequest::new("Hello");
    let err = gateway_for(&server)
        .dispatch("claude", &request, "test-key")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidProvider(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_credential_makes_no_network_call() {
    let server = MockServer::start().await;

    let request = GenerationRequest::new("Hello");
    let err = gateway_for(&server)
        .dispatch("gemini", &request, "")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingCredential));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_prompt_makes_no_network_call_in_any_mode() {
    let server = MockServer::start().await;
    let gateway = gateway_for(&server);

    for mode in [Mode::Text, Mode::Code, Mode::Image] {
        let request = GenerationRequest::new("").with_mode(mode);
        let err = gateway
            .dispatch("openai", &request, "test-key")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "mode {mode:?}");
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_history_order_preserved_with_prompt_last() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Third question").with_history(vec![
        ConversationTurn::user("First question"),
        ConversationTurn::assistant("First answer"),
        ConversationTurn::user("Second question"),
        ConversationTurn::assistant("Second answer"),
    ]);
    gateway_for(&server)
        .dispatch("openai", &request, "test-key")
        .await
        .unwrap();

    let bodies = captured_bodies(&server).await;
    let messages = bodies[0]["messages"].as_array().unwrap();

    // System turn leads, then history in order, then the prompt.
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "First question");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["content"], "First answer");
    assert_eq!(messages[3]["content"], "Second question");
    assert_eq!(messages[4]["content"], "Second answer");
    assert_eq!(messages[5]["role"], "user");
    assert_eq!(messages[5]["content"], "Third question");
}

#[tokio::test]
async fn test_gemini_history_uses_model_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("And now?").with_history(vec![
        ConversationTurn::user("Hi"),
        ConversationTurn::assistant("Hello!"),
    ]);
    gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap();

    let bodies = captured_bodies(&server).await;
    let contents = bodies[0]["contents"].as_array().unwrap();

    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["text"], "And now?");
}

#[tokio::test]
async fn test_gemini_image_model_substitution() {
    let server = MockServer::start().await;
    // A chat model id in image mode must be replaced by the default
    // image model before dispatch; the path proves the substitution.
    Mock::given(method("POST"))
        .and(path("/models/imagen-3.0-generate-001:predict"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{"bytesBase64Encoded": "AQID"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::new("a cat in a hat")
        .with_mode(Mode::Image)
        .with_model("gemini-1.5-pro");
    let result = gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap();

    let image = result.into_image().unwrap();
    assert_eq!(image.data, vec![1, 2, 3]);
    assert_eq!(image.mime_type, "image/png");

    let bodies = captured_bodies(&server).await;
    assert_eq!(bodies[0]["instances"][0]["prompt"], "a cat in a hat");
    assert_eq!(bodies[0]["parameters"]["sampleCount"], 1);
}

#[tokio::test]
async fn test_openai_image_model_substitution() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"b64_json": "AQID"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = GenerationRequest::new("a cat in a hat")
        .with_mode(Mode::Image)
        .with_model("gpt-4o");
    let result = gateway_for(&server)
        .dispatch("openai", &request, "test-key")
        .await
        .unwrap();

    assert_eq!(result.into_image().unwrap().data, vec![1, 2, 3]);

    let bodies = captured_bodies(&server).await;
    assert_eq!(bodies[0]["model"], "dall-e-3");
    assert_eq!(bodies[0]["prompt"], "a cat in a hat");
    assert_eq!(bodies[0]["n"], 1);
    assert_eq!(bodies[0]["size"], "1024x1024");
    assert_eq!(bodies[0]["response_format"], "b64_json");
}

#[tokio::test]
async fn test_image_response_without_data_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("a cat").with_mode(Mode::Image);
    let err = gateway_for(&server)
        .dispatch("openai", &request, "test-key")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_json_mode_travels_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "{}"}]}}]
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Give me JSON").with_json_mode(true);
    gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap();

    let bodies = captured_bodies(&server).await;
    assert_eq!(
        bodies[0]["generationConfig"]["responseMimeType"],
        "application/json"
    );
}

#[tokio::test]
async fn test_attachment_rides_in_the_final_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "a photo"}]}}]
        })))
        .mount(&server)
        .await;

    let request = GenerationRequest::new("Describe this")
        .with_history(vec![ConversationTurn::user("Hi")])
        .with_attachment(Attachment::new(vec![1, 2, 3], "image/png"));
    gateway_for(&server)
        .dispatch("gemini", &request, "test-key")
        .await
        .unwrap();

    let bodies = captured_bodies(&server).await;
    let contents = bodies[0]["contents"].as_array().unwrap();
    let parts = contents[1]["parts"].as_array().unwrap();

    // Gemini order: image part before the text part.
    assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[0]["inlineData"]["data"], "AQID");
    assert_eq!(parts[1]["text"], "Describe this");
}

#[tokio::test]
async fn test_repeated_dispatch_is_independent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "same answer"}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let request = GenerationRequest::new("Hello");

    let first = gateway.dispatch("openai", &request, "test-key").await.unwrap();
    let second = gateway.dispatch("openai", &request, "test-key").await.unwrap();
    assert_eq!(first, second);

    // Both outbound bodies are identical; nothing leaked between calls.
    let bodies = captured_bodies(&server).await;
    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn test_gemini_model_listing_classifies_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {
                    "name": "models/gemini-1.5-flash",
                    "displayName": "Gemini 1.5 Flash",
                    "supportedGenerationMethods": ["generateContent", "countTokens"]
                },
                {
                    "name": "models/imagen-3.0-generate-001",
                    "displayName": "Imagen 3",
                    "supportedGenerationMethods": ["predict"]
                },
                {
                    "name": "models/text-embedding-004",
                    "supportedGenerationMethods": ["embedContent"]
                }
            ]
        })))
        .mount(&server)
        .await;

    let models = gateway_for(&server)
        .list_models("gemini", "test-key")
        .await
        .unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "gemini-1.5-flash");
    assert_eq!(models[0].name, "Gemini 1.5 Flash");
    assert_eq!(models[0].kind, ModelKind::Text);
    assert_eq!(models[1].id, "imagen-3.0-generate-001");
    assert_eq!(models[1].kind, ModelKind::Image);
}

#[tokio::test]
async fn test_openai_model_listing_is_curated() {
    let server = MockServer::start().await;

    let models = gateway_for(&server)
        .list_models("openai", "test-key")
        .await
        .unwrap();

    assert!(models.iter().any(|m| m.id == "gpt-4o" && m.kind == ModelKind::Text));
    assert!(models.iter().any(|m| m.id == "dall-e-3" && m.kind == ModelKind::Image));
    // No vendor round trip for the curated list.
    assert!(server.received_requests().await.unwrap().is_empty());
}

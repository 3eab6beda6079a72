use serde_json::json;

/// Frames each payload as a Server-Sent-Events `data:` event.
pub fn sse_body(payloads: &[&str]) -> String {
    return payloads
        .iter()
        .map(|payload| {
            return format!("data: {payload}\n\n");
        })
        .collect::<Vec<String>>()
        .join("");
}

/// A chat-completions stream chunk carrying a single content delta.
pub fn openai_chunk(content: &str) -> String {
    return json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "choices": [{
            "index": 0,
            "delta": { "content": content },
            "finish_reason": null
        }]
    })
    .to_string();
}

/// A Gemini `streamGenerateContent` chunk. Sources are `(uri, title)` pairs;
/// an empty slice produces a chunk without grounding metadata.
pub fn gemini_chunk(text: &str, sources: &[(&str, &str)]) -> String {
    let mut candidate = json!({
        "content": {
            "role": "model",
            "parts": [{ "text": text }]
        },
        "index": 0
    });

    if !sources.is_empty() {
        let chunks = sources
            .iter()
            .map(|(uri, title)| {
                return json!({ "web": { "uri": uri, "title": title } });
            })
            .collect::<Vec<serde_json::Value>>();

        candidate["groundingMetadata"] = json!({ "groundingChunks": chunks });
    }

    return json!({ "candidates": [candidate] }).to_string();
}

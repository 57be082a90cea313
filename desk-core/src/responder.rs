//! LLM auto-responder for unclaimed sessions.
//!
//! Assembles conversation context (recent history, extracted profile,
//! knowledge-base chunks from the similarity-search collaborator) into one
//! prompt and parses the generated `{text, links}` reply. Generation details
//! stay behind the `ContentGenerator` boundary.

use crate::enrichment::render_history;
use crate::fields::FieldConfigService;
use crate::models::SessionId;
use crate::store::{ContentGenerator, SimilaritySearch, Store};
use anyhow::Result;
use std::sync::Arc;

const EMPTY_QUERY_REPLY: &str = "Nội dung câu hỏi trống, vui lòng nhập lại.";
const KNOWLEDGE_TOP_K: usize = 10;
const REPLY_HISTORY_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub links: Vec<String>,
}

pub struct AutoReplier {
    store: Arc<dyn Store>,
    fields: Arc<FieldConfigService>,
    generator: Arc<dyn ContentGenerator>,
    search: Arc<dyn SimilaritySearch>,
}

impl AutoReplier {
    pub fn new(
        store: Arc<dyn Store>,
        fields: Arc<FieldConfigService>,
        generator: Arc<dyn ContentGenerator>,
        search: Arc<dyn SimilaritySearch>,
    ) -> Self {
        Self {
            store,
            fields,
            generator,
            search,
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn reply(&self, session_id: SessionId, query: &str) -> Result<Reply> {
        if query.trim().is_empty() {
            return Ok(Reply {
                text: EMPTY_QUERY_REPLY.to_string(),
                links: vec![],
            });
        }

        let history = render_history(
            &self
                .store
                .recent_messages(session_id, REPLY_HISTORY_LIMIT)
                .await?,
        );
        let profile = self
            .store
            .customer_info(session_id)
            .await?
            .map(|info| serde_json::to_string(&info.data).unwrap_or_default())
            .unwrap_or_default();

        // A bad search key or an unreachable knowledge base degrades the
        // reply, it does not block it.
        let search_key = match self
            .generator
            .generate(&search_key_prompt(&history, query))
            .await
        {
            Ok(key) if !key.trim().is_empty() => key.trim().to_string(),
            Ok(_) => query.to_string(),
            Err(e) => {
                tracing::debug!(%e, "search-key generation failed; using the raw query");
                query.to_string()
            }
        };
        let knowledge = match self.search.search(&search_key, KNOWLEDGE_TOP_K).await {
            Ok(chunks) => chunks
                .into_iter()
                .map(|c| c.content)
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                tracing::warn!(%e, "similarity search failed; replying without knowledge");
                String::new()
            }
        };

        let collect_fields = match self.fields.all().await {
            Ok(configs) => configs
                .iter()
                .map(|c| {
                    let marker = if c.is_required { "bắt buộc" } else { "tùy chọn" };
                    format!("- {} ({marker})", c.column_name)
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                tracing::warn!(%e, "field configs unavailable for reply prompt");
                String::new()
            }
        };

        let raw = self
            .generator
            .generate(&reply_prompt(
                &knowledge,
                &profile,
                &collect_fields,
                &history,
                query,
            ))
            .await?;
        Ok(parse_reply(&raw))
    }
}

fn search_key_prompt(history: &str, query: &str) -> String {
    format!(
        "Hội thoại trước đó:\n{history}\n\n\
         Câu hỏi hiện tại:\n{query}\n\n\
         Hãy trích ra từ khóa tìm kiếm ngắn gọn (dưới 15 từ) phản ánh ý định chính của người dùng."
    )
}

fn reply_prompt(
    knowledge: &str,
    profile: &str,
    collect_fields: &str,
    history: &str,
    query: &str,
) -> String {
    format!(
        "Bạn là trợ lý ảo bán hàng chuyên nghiệp của cửa hàng thời trang. \
         Tư vấn dựa trên Kiến Thức Cơ Sở, không bịa thông tin; xưng \"em\", gọi khách \"anh/chị\"; \
         khéo léo thu thập các thông tin còn thiếu.\n\
         \n\
         === KIẾN THỨC CƠ SỞ ===\n{knowledge}\n\
         \n\
         === THÔNG TIN KHÁCH HÀNG ĐÃ CÓ ===\n{profile}\n\
         \n\
         === THÔNG TIN CẦN THU THẬP ===\n{collect_fields}\n\
         \n\
         === LỊCH SỬ ===\n{history}\n\
         \n\
         Tin nhắn mới: {query}\n\
         \n\
         BẮT BUỘC trả về JSON thuần túy với 2 trường: \"text\" (câu trả lời) và \"links\" \
         (mảng link hình ảnh sản phẩm, [] nếu không có). Không markdown."
    )
}

/// Parse the generated reply, falling back to the raw text when the model
/// ignored the JSON contract.
fn parse_reply(raw: &str) -> Reply {
    let cleaned = strip_code_fences(raw);
    let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) else {
        return Reply {
            text: cleaned.to_string(),
            links: vec![],
        };
    };

    let text = value
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| cleaned.to_string());
    let links = match value.get("links") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        Some(serde_json::Value::String(link)) => vec![link.clone()],
        _ => vec![],
    };
    Reply { text, links }
}

/// Strip a leading/trailing markdown code fence (with optional `json` info
/// string) the way generation output tends to arrive.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.strip_prefix("json").unwrap_or(rest);
        s = s.strip_suffix("```").unwrap_or(s);
        s = s.trim();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::sqlite::SqliteStore;
    use crate::store::{NoopSimilaritySearch, ScoredChunk};
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn fenced_json_is_unwrapped() {
        assert_eq!(
            strip_code_fences("```json\n{\"text\": \"ok\"}\n```"),
            "{\"text\": \"ok\"}"
        );
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn reply_parsing_falls_back_to_raw_text() {
        let reply = parse_reply("Dạ, còn size M ạ.");
        assert_eq!(reply.text, "Dạ, còn size M ạ.");
        assert!(reply.links.is_empty());

        let reply = parse_reply(r#"{"text": "Dạ em gửi ảnh ạ.", "links": "https://a/1.jpg"}"#);
        assert_eq!(reply.links, vec!["https://a/1.jpg"]);

        let reply =
            parse_reply("```json\n{\"text\": \"Dạ\", \"links\": [\"https://a/1.jpg\", \"https://a/2.jpg\"]}\n```");
        assert_eq!(reply.text, "Dạ");
        assert_eq!(reply.links.len(), 2);
    }

    struct QueueGenerator {
        responses: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl QueueGenerator {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(String::from).collect()),
                prompts: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl ContentGenerator for QueueGenerator {
        async fn generate(&self, prompt: &str) -> AnyResult<String> {
            self.prompts.lock().expect("prompts").push(prompt.to_string());
            Ok(self
                .responses
                .lock()
                .expect("responses")
                .pop()
                .unwrap_or_default())
        }
    }

    struct FixedSearch;

    #[async_trait]
    impl SimilaritySearch for FixedSearch {
        async fn search(&self, _query: &str, _k: usize) -> AnyResult<Vec<ScoredChunk>> {
            Ok(vec![ScoredChunk {
                content: "{ \"Sản phẩm\": \"Váy Linen\", \"Size\": \"S, M\" }".to_string(),
                score: 0.12,
            }])
        }
    }

    async fn replier(generator: Arc<dyn ContentGenerator>) -> AutoReplier {
        let store = Arc::new(SqliteStore::open_in_memory().await.expect("open store"));
        let cache = Arc::new(MemoryCache::new());
        let fields = Arc::new(FieldConfigService::new(store.clone(), cache));
        AutoReplier::new(store, fields, generator, Arc::new(FixedSearch))
    }

    #[tokio::test]
    async fn empty_query_gets_the_fixed_reply_without_generation() {
        let generator = Arc::new(QueueGenerator::new(vec![]));
        let replier = replier(generator.clone()).await;
        let reply = replier.reply(1, "   ").await.expect("reply");
        assert_eq!(reply.text, EMPTY_QUERY_REPLY);
        assert!(generator.prompts.lock().expect("prompts").is_empty());
    }

    #[tokio::test]
    async fn reply_feeds_knowledge_into_the_prompt() {
        let generator = Arc::new(QueueGenerator::new(vec![
            "váy linen size M",
            r#"{"text": "Dạ, Váy Linen còn size M ạ.", "links": []}"#,
        ]));
        let replier = replier(generator.clone()).await;
        let reply = replier.reply(1, "Còn size M không?").await.expect("reply");
        assert_eq!(reply.text, "Dạ, Váy Linen còn size M ạ.");

        let prompts = generator.prompts.lock().expect("prompts");
        assert_eq!(prompts.len(), 2, "search key then reply");
        assert!(prompts[1].contains("Váy Linen"), "knowledge chunk included");
        assert!(prompts[1].contains("Còn size M không?"));
    }

    #[tokio::test]
    async fn noop_search_still_produces_a_reply() {
        let generator = Arc::new(QueueGenerator::new(vec![
            "key",
            r#"{"text": "Dạ em kiểm tra giúp mình ạ.", "links": []}"#,
        ]));
        let store = Arc::new(SqliteStore::open_in_memory().await.expect("open store"));
        let cache = Arc::new(MemoryCache::new());
        let fields = Arc::new(FieldConfigService::new(store.clone(), cache));
        let replier = AutoReplier::new(store, fields, generator, Arc::new(NoopSimilaritySearch));
        let reply = replier.reply(1, "ship về Huế?").await.expect("reply");
        assert_eq!(reply.text, "Dạ em kiểm tra giúp mình ạ.");
    }
}

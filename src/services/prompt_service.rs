//! Prompt 构建服务
//!
//! 负责 OCR 提示词、OCR+推荐提示词以及推荐对话消息的构建

use crate::llm::ChatMessage;

/// OCR 提示词
const OCR_PROMPT: &str =
    "この画像からすべてのテキストを抽出してください。日本語のメニューで価格情報も含めてください。";

/// OCR + 推荐提示词，要求固定的 JSON 结构
const OCR_AND_RECOMMEND_PROMPT: &str = r#"
この画像にあるメニュー全体のテキストを抽出し、さらに含まれているドリンクの中からおすすめのドリンク3つを選んでください。

必ず以下の形式のJSONで回答してください：
{
  "text": "ここに抽出されたメニューのテキスト全体を入れる",
  "recommendations": [
    {"name": "商品名", "description": "説明", "reason": "おすすめ理由"},
    {"name": "商品名", "description": "説明", "reason": "おすすめ理由"},
    {"name": "商品名", "description": "説明", "reason": "おすすめ理由"}
  ]
}
"#;

/// 推荐系统提示词，固定输出语言与 JSON 结构
const RECOMMEND_SYSTEM_PROMPT: &str = r#"あなたは日本語で応答するAIアシスタントです。提供されたメニューから最適なおすすめを提案します。
必ずJSON形式で応答してください。

例えば以下のようなJSON形式で返答します:
{
  "recommendations": [
    {"name": "山崎12年", "description": "シングルモルトウイスキー", "reason": "和食との相性が良い"},
    {"name": "獺祭", "description": "純米大吟醸", "reason": "魚料理に合う辛口の日本酒"},
    {"name": "白ワイン", "description": "シャルドネ", "reason": "軽い前菜に最適"}
  ]
}"#;

const RECOMMEND_USER_TEMPLATE: &str = r#"次のメニューから、おすすめのドリンク3つを選び、名前、説明、おすすめ理由を日本語で提供してください。必ず以下の形式のJSONで返答してください：
{
  "recommendations": [
    {"name": "商品名", "description": "説明", "reason": "おすすめ理由"},
    {"name": "商品名", "description": "説明", "reason": "おすすめ理由"},
    {"name": "商品名", "description": "説明", "reason": "おすすめ理由"}
  ]
}

メニュー:
"#;

/// 推荐用的采样参数
pub const RECOMMEND_TEMPERATURE: f64 = 0.7;
pub const RECOMMEND_MAX_TOKENS: u32 = 1500;

/// Prompt 服务
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptService;

impl PromptService {
    pub fn new() -> Self {
        Self
    }

    pub fn ocr_prompt(&self) -> &'static str {
        OCR_PROMPT
    }

    pub fn ocr_and_recommend_prompt(&self) -> &'static str {
        OCR_AND_RECOMMEND_PROMPT
    }

    /// 构建推荐对话消息
    pub fn build_recommend_messages(&self, menu_text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(RECOMMEND_SYSTEM_PROMPT),
            ChatMessage::user(format!("{}{}", RECOMMEND_USER_TEMPLATE, menu_text)),
        ]
    }
}

use askama::Template;
use rag_core::{AppViewModel, KnowledgeRef, Role, Severity};

struct UrlField<'a> {
    index: usize,
    number: usize,
    value: &'a str,
}

struct NoticeView<'a> {
    class: &'static str,
    text: &'a str,
}

struct TurnView<'a> {
    class: &'static str,
    label: &'static str,
    content: &'a str,
}

#[derive(Template)]
#[template(path = "app.html")]
struct AppFragment<'a> {
    urls: Vec<UrlField<'a>>,
    can_add_url: bool,
    load_in_progress: bool,
    loaded_urls: &'a [String],
    knowledge: Option<String>,
    notice: Option<NoticeView<'a>>,
    turns: Vec<TurnView<'a>>,
    streaming_answer: Option<&'a str>,
}

/// Renders the sidebar and conversation for `view`. This is what every
/// interaction swaps into the page.
pub fn app_fragment(view: &AppViewModel) -> Result<String, askama::Error> {
    AppFragment {
        urls: view
            .url_entries
            .iter()
            .enumerate()
            .map(|(index, value)| UrlField {
                index,
                number: index + 1,
                value,
            })
            .collect(),
        can_add_url: view.can_add_url,
        load_in_progress: view.load_in_progress,
        loaded_urls: &view.loaded_urls,
        knowledge: view
            .knowledge
            .as_ref()
            .filter(|_| view.docs_loaded)
            .map(knowledge_summary),
        notice: view.notice.as_ref().map(|notice| NoticeView {
            class: severity_class(notice.severity),
            text: &notice.text,
        }),
        turns: view
            .turns
            .iter()
            .map(|turn| {
                let (class, label) = match turn.role {
                    Role::User => ("user", "You"),
                    Role::Assistant => ("assistant", "Assistant"),
                };
                TurnView {
                    class,
                    label,
                    content: &turn.content,
                }
            })
            .collect(),
        streaming_answer: view.streaming_answer.as_deref(),
    }
    .render()
}

fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "success",
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

fn knowledge_summary(knowledge: &KnowledgeRef) -> String {
    format!(
        "{} documents, {} chunks in {}",
        knowledge.documents, knowledge.chunks, knowledge.collection
    )
}

#[cfg(test)]
mod tests {
    use rag_core::{Notice, Turn};

    use super::*;

    fn view() -> AppViewModel {
        AppViewModel {
            url_entries: vec![String::new()],
            can_add_url: false,
            ..AppViewModel::default()
        }
    }

    #[test]
    fn user_text_is_escaped() {
        let view = AppViewModel {
            url_entries: vec!["a.example?q=<script>".into()],
            turns: vec![Turn {
                role: Role::User,
                content: "<b>bold & more".into(),
            }],
            ..view()
        };
        let html = app_fragment(&view).unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;b&gt;bold &amp; more"));
    }

    #[test]
    fn add_button_follows_view_flag() {
        let html = app_fragment(&view()).unwrap();
        assert!(html.contains(r#"id="add-url" disabled"#));

        let enabled = AppViewModel {
            url_entries: vec!["https://a.example".into()],
            can_add_url: true,
            ..view()
        };
        let html = app_fragment(&enabled).unwrap();
        assert!(!html.contains(r#"id="add-url" disabled"#));
    }

    #[test]
    fn loaded_urls_are_listed_in_order() {
        let loaded = AppViewModel {
            docs_loaded: true,
            loaded_urls: vec!["a.example".into(), "b.example".into()],
            knowledge: Some(KnowledgeRef {
                collection: "AgenticRag".into(),
                documents: 2,
                chunks: 7,
            }),
            ..view()
        };
        let html = app_fragment(&loaded).unwrap();
        let a = html.find("<li>a.example</li>").unwrap();
        let b = html.find("<li>b.example</li>").unwrap();
        assert!(a < b);
        assert!(html.contains("Loaded URLs:"));
        assert!(html.contains("2 documents, 7 chunks in AgenticRag"));
    }

    #[test]
    fn notice_and_streaming_answer_are_shown() {
        let answering = AppViewModel {
            notice: Some(Notice::new(Severity::Warning, "Load the knowledge base first.")),
            streaming_answer: Some("Hel".into()),
            ..view()
        };
        let html = app_fragment(&answering).unwrap();
        assert!(html.contains(r#"class="notice notice-warning">Load the knowledge base first.</div>"#));
        assert!(html.contains("<pre>Hel</pre>"));
    }

    #[test]
    fn nothing_loaded_hides_the_list() {
        let html = app_fragment(&view()).unwrap();
        assert!(!html.contains("Loaded URLs:"));
    }
}

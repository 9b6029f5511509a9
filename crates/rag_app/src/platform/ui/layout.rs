use askama::Template;

use super::constants::*;
use crate::platform::session::SessionId;

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate<'a> {
    page_title: &'a str,
    heading: &'a str,
    session_id: String,
    app_html: String,
    answer_event: &'a str,
    done_event: &'a str,
    notice_event: &'a str,
}

/// Full page shell around an already rendered app fragment.
pub fn page(id: SessionId, app_html: String) -> Result<String, askama::Error> {
    PageTemplate {
        page_title: PAGE_TITLE,
        heading: HEADING,
        session_id: id.to_string(),
        app_html,
        answer_event: EVENT_ANSWER,
        done_event: EVENT_DONE,
        notice_event: EVENT_NOTICE,
    }
    .render()
}

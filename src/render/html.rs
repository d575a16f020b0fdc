//! Self-contained HTML document.

use std::io::{self, Write};

use tracing::info;

use super::{Renderer, escape_html};
use crate::core::models::{DisplayRecord, Topic};
use crate::error::{ExportError, Result};

const STYLE: &str = r#"  <style>
    body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; background: #f4f5f7; color: #1f2933; }
    header { background: #2b5278; color: #fff; padding: 16px 24px; }
    h1 { margin: 0; font-size: 22px; }
    nav { background: #fff; border-bottom: 1px solid #e5e7eb; padding: 10px 24px; display: flex; flex-wrap: wrap; gap: 8px; }
    nav a { color: #2b5278; text-decoration: none; padding: 4px 10px; border-radius: 12px; background: #eef2f7; font-size: 13px; }
    main { max-width: 860px; margin: 0 auto; padding: 16px; }
    section.topic { margin-bottom: 32px; }
    section.topic h2 { font-size: 18px; border-bottom: 2px solid #2b5278; padding-bottom: 4px; }
    .count { color: #6b7280; font-size: 13px; font-weight: normal; }
    .message { background: #fff; border-radius: 8px; padding: 10px 14px; margin: 8px 0; box-shadow: 0 1px 2px rgba(0,0,0,.06); }
    .message:target { outline: 2px solid #f0b429; }
    .message.service { background: #eef2f7; text-align: center; font-style: italic; }
    .meta { font-size: 12px; color: #6b7280; margin-bottom: 4px; }
    .sender { font-weight: 600; color: #2b5278; }
    .reply a, a.internal-link { color: #3b82f6; }
    .content { white-space: pre-wrap; word-wrap: break-word; }
    .content img, .content video { max-width: 100%; border-radius: 6px; }
    .skipped { color: #b45309; font-size: 12px; margin-top: 4px; }
    .reactions { margin-top: 6px; display: flex; gap: 6px; }
    .reaction { background: #eef2f7; border-radius: 10px; padding: 1px 8px; font-size: 13px; }
    .empty { text-align: center; color: #6b7280; padding: 48px 16px; }
  </style>
"#;

/// Renders the archive as a single HTML page.
///
/// Record content is inserted as-is: it is already HTML produced by the
/// pipeline. Everything else (titles, sender labels, dates, reasons) is
/// escaped.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }

    fn write_head(out: &mut Vec<u8>, title: &str) -> io::Result<()> {
        write!(
            out,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"utf-8\">\n  \
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n  \
             <title>{}</title>\n",
            escape_html(title)
        )?;
        out.extend_from_slice(STYLE.as_bytes());
        write!(
            out,
            "</head>\n<body>\n<header><h1>{}</h1></header>\n",
            escape_html(title)
        )?;
        Ok(())
    }

    fn write_nav(out: &mut Vec<u8>, topics: &[Topic]) -> io::Result<()> {
        if topics.len() < 2 {
            return Ok(());
        }
        out.extend_from_slice(b"<nav>\n");
        for topic in topics {
            writeln!(
                out,
                "  <a href=\"#topic-{}\">{} <span class=\"count\">{}</span></a>",
                topic.id,
                escape_html(&topic.title),
                topic.messages.len()
            )?;
        }
        out.extend_from_slice(b"</nav>\n");
        Ok(())
    }

    fn write_topic(out: &mut Vec<u8>, topic: &Topic) -> io::Result<()> {
        writeln!(
            out,
            "<section class=\"topic\" id=\"topic-{}\">\n<h2>{} <span class=\"count\">({} messages)</span></h2>",
            topic.id,
            escape_html(&topic.title),
            topic.messages.len()
        )?;
        for record in &topic.messages {
            Self::write_record(out, record)?;
        }
        out.extend_from_slice(b"</section>\n");
        Ok(())
    }

    fn write_record(out: &mut Vec<u8>, record: &DisplayRecord) -> io::Result<()> {
        if record.is_service {
            writeln!(
                out,
                "<div class=\"message service\" id=\"msg-{}\"><span class=\"meta\">{}</span> {}</div>",
                record.id,
                escape_html(&record.date),
                escape_html(&record.service_description)
            )?;
            return Ok(());
        }

        writeln!(out, "<div class=\"message\" id=\"msg-{}\">", record.id)?;
        writeln!(
            out,
            "  <div class=\"meta\"><span class=\"sender\">{}</span> · {}</div>",
            escape_html(&record.sender),
            escape_html(&record.date)
        )?;
        if let (true, Some(target)) = (record.is_reply, record.reply_to_msg_id) {
            writeln!(
                out,
                "  <div class=\"reply\"><a href=\"#msg-{target}\">↩ reply to #{target}</a></div>"
            )?;
        }
        if !record.html_content.is_empty() {
            writeln!(out, "  <div class=\"content\">{}</div>", record.html_content)?;
        }
        if !record.skip_reason.is_empty() {
            writeln!(
                out,
                "  <div class=\"skipped\">Media skipped: {}</div>",
                escape_html(&record.skip_reason)
            )?;
        }
        if !record.reactions.is_empty() {
            out.extend_from_slice(b"  <div class=\"reactions\">");
            for reaction in &record.reactions {
                write!(
                    out,
                    "<span class=\"reaction\">{} {}</span>",
                    escape_html(&reaction.emoticon),
                    reaction.count
                )?;
            }
            out.extend_from_slice(b"</div>\n");
        }
        out.extend_from_slice(b"</div>\n");
        Ok(())
    }

    fn write_document(out: &mut Vec<u8>, chat_name: &str, topics: &[Topic]) -> io::Result<()> {
        Self::write_head(out, &format!("Archive · {chat_name}"))?;
        Self::write_nav(out, topics)?;
        out.extend_from_slice(b"<main>\n");
        for topic in topics {
            Self::write_topic(out, topic)?;
        }
        Self::write_tail(out);
        Ok(())
    }

    fn write_tail(out: &mut Vec<u8>) {
        out.extend_from_slice(b"</main>\n</body>\n</html>\n");
    }
}

impl Renderer for HtmlRenderer {
    fn render(&self, chat_name: &str, topics: &[Topic]) -> Result<Vec<u8>> {
        let total: usize = topics.iter().map(|t| t.messages.len()).sum();
        info!(topics = topics.len(), messages = total, "rendering HTML");

        let mut out = Vec::with_capacity(4096 + total * 256);
        Self::write_document(&mut out, chat_name, topics).map_err(render_error)?;
        Ok(out)
    }

    fn render_empty(&self, chat_name: &str, message: &str) -> Result<Vec<u8>> {
        info!("rendering empty HTML");

        let mut out = Vec::with_capacity(4096);
        Self::write_head(&mut out, &format!("Archive · {chat_name} (empty)"))
            .and_then(|()| {
                writeln!(
                    out,
                    "<main>\n<p class=\"empty\">{}</p>",
                    escape_html(message)
                )
            })
            .map_err(render_error)?;
        Self::write_tail(&mut out);
        Ok(out)
    }
}

fn render_error(err: io::Error) -> ExportError {
    ExportError::render(err.to_string())
}

use crate::{Chunk, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Packs paragraphs into chunks of at most `max_chars` characters. Paragraphs
/// that are too long on their own are split on sentence ends, and sentences
/// that are still too long are hard-split.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if char_len(paragraph) > max_chars {
            flush(&mut current, &mut chunks);
            for piece in split_long(paragraph, max_chars) {
                append(&mut current, &piece, " ", max_chars, &mut chunks);
            }
            flush(&mut current, &mut chunks);
            continue;
        }
        append(&mut current, paragraph, "\n\n", max_chars, &mut chunks);
    }

    flush(&mut current, &mut chunks);
    chunks
}

/// Splits a document into [`Chunk`]s carrying its URL and title.
pub fn chunk_document(doc: &Document, max_chars: usize) -> Vec<Chunk> {
    chunk_text(&doc.markdown, max_chars)
        .into_iter()
        .enumerate()
        .map(|(index, content)| Chunk::new(&doc.url, doc.title.as_deref(), index, content))
        .collect()
}

fn append(
    current: &mut String,
    piece: &str,
    separator: &str,
    max_chars: usize,
    chunks: &mut Vec<String>,
) {
    let needed = if current.is_empty() {
        char_len(piece)
    } else {
        char_len(current) + char_len(separator) + char_len(piece)
    };
    if needed > max_chars {
        flush(current, chunks);
    }
    if !current.is_empty() {
        current.push_str(separator);
    }
    current.push_str(piece);
}

fn flush(current: &mut String, chunks: &mut Vec<String>) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    for sentence in split_sentences(paragraph) {
        if char_len(sentence) <= max_chars {
            pieces.push(sentence.to_string());
            continue;
        }
        let chars: Vec<char> = sentence.chars().collect();
        pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
    }
    pieces
}

fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = paragraph.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        let at_boundary = matches!(ch, '.' | '!' | '?')
            && chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = idx + ch.len_utf8();
            let sentence = paragraph[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let rest = paragraph[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

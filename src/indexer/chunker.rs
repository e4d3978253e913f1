//! Paragraph-aware text splitting.

/// Characters a long paragraph may be cut after.
const SENTENCE_ENDS: &[char] = &['.', '!', '?', '\n', '。', '！', '？'];

/// Splits text into chunks of at most `chunk_size` characters (`char` count).
///
/// Paragraphs (separated by a blank line) are packed together while they
/// fit; a paragraph longer than `chunk_size` is cut at sentence boundaries.
pub fn split_into_chunks(content: &str, chunk_size: usize) -> Vec<String> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }
    if content.chars().count() <= chunk_size {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for para in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let para_len = para.chars().count();

        if current_len > 0 && current_len + para_len + 2 > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if para_len > chunk_size {
            chunks.extend(split_large_paragraph(para, chunk_size));
            continue;
        }

        if current_len > 0 {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(para);
        current_len += para_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Cuts a paragraph into pieces, preferring the last sentence end found in
/// the second half of each window.
fn split_large_paragraph(para: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = para.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while chars.len() - start > chunk_size {
        let window = &chars[start..start + chunk_size];
        let min_search = chunk_size / 2;
        let cut = window[min_search..]
            .iter()
            .rposition(|c| SENTENCE_ENDS.contains(c))
            .map_or(chunk_size, |i| min_search + i + 1);

        push_trimmed(&mut chunks, &chars[start..start + cut]);
        start += cut;
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }

    push_trimmed(&mut chunks, &chars[start..]);
    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chars: &[char]) {
    let piece: String = chars.iter().collect();
    let piece = piece.trim();
    if !piece.is_empty() {
        chunks.push(piece.to_string());
    }
}

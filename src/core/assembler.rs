//! Content assembly: splicing illustrations into the article body.
//!
//! The body is split on the paragraph separator without trimming, so the
//! assembled text is the original body with image blocks added and nothing
//! else changed. Paragraph indices count the non-blank chunks only.
//!
//! Insertions are applied from the highest paragraph index down. Every
//! target is computed up front against the original chunk list; inserting
//! back-to-front keeps each remaining target valid without recomputation.

/// Separator between paragraphs in article bodies
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// An image block to place after a paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInsertion {
    pub paragraph_index: usize,
    pub markup: String,
}

impl ImageInsertion {
    pub fn new(paragraph_index: usize, markup: impl Into<String>) -> Self {
        Self {
            paragraph_index,
            markup: markup.into(),
        }
    }
}

/// Split an article body into non-empty paragraphs
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Insert each markup block right after its paragraph.
///
/// Targets past the end are appended. Several insertions for the same
/// paragraph all land there, in input order.
pub fn assemble(body_text: &str, insertions: &[ImageInsertion]) -> String {
    let mut blocks: Vec<String> = if body_text.is_empty() {
        Vec::new()
    } else {
        body_text
            .split(PARAGRAPH_SEPARATOR)
            .map(str::to_string)
            .collect()
    };

    // Chunk position of each paragraph, blank chunks excluded
    let paragraph_slots: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .map(|(slot, _)| slot)
        .collect();
    let end = blocks.len();
    let target_of = |index: usize| paragraph_slots.get(index).map_or(end, |slot| slot + 1);

    // Stable sort keeps input order among equal indices; reversing it here
    // and inserting at the same slot restores that order in the output.
    let mut ordered: Vec<&ImageInsertion> = insertions.iter().collect();
    ordered.sort_by(|a, b| b.paragraph_index.cmp(&a.paragraph_index));
    let ordered = reverse_equal_runs(ordered);

    let targets: Vec<(usize, &ImageInsertion)> = ordered
        .into_iter()
        .map(|insertion| (target_of(insertion.paragraph_index), insertion))
        .collect();

    for (target, insertion) in targets {
        blocks.insert(target, insertion.markup.clone());
    }

    blocks.join(PARAGRAPH_SEPARATOR)
}

/// Reverse each run of equal paragraph indices
fn reverse_equal_runs(ordered: Vec<&ImageInsertion>) -> Vec<&ImageInsertion> {
    let mut result = Vec::with_capacity(ordered.len());
    let mut run: Vec<&ImageInsertion> = Vec::new();

    for insertion in ordered {
        if run
            .last()
            .is_some_and(|last| last.paragraph_index != insertion.paragraph_index)
        {
            result.extend(run.drain(..).rev());
        }
        run.push(insertion);
    }
    result.extend(run.into_iter().rev());

    result
}

/// Markdown image block
pub fn image_markup(alt: &str, url: &str) -> String {
    let alt = alt.replace(['[', ']', '\n'], " ");
    format!("![{}]({})", alt.trim(), url)
}

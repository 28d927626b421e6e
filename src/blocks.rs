//! Block-based editing model for notes.
//!
//! While a note is being edited its body is an ordered list of content
//! blocks: text segments interleaved with image and audio attachments. On
//! save the blocks are composed back into `Note::content` and
//! `Note::attachments`; on re-entry the note is decomposed again.
//!
//! A [`ContentBlocks`] sequence is never empty. Removing the last block
//! leaves a single empty text block behind.
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{parse_tags, Attachment, AttachmentKind, Note, NoteDraft};

/// Separator placed between text blocks when composing note content
pub const TEXT_BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    Image,
    Audio,
}

impl From<AttachmentKind> for BlockKind {
    fn from(kind: AttachmentKind) -> Self {
        match kind {
            AttachmentKind::Image => BlockKind::Image,
            AttachmentKind::Audio => BlockKind::Audio,
        }
    }
}

impl BlockKind {
    /// Attachment kind for media blocks, `None` for text.
    pub fn attachment_kind(self) -> Option<AttachmentKind> {
        match self {
            BlockKind::Text => None,
            BlockKind::Image => Some(AttachmentKind::Image),
            BlockKind::Audio => Some(AttachmentKind::Audio),
        }
    }
}

/// One segment of a note body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    pub kind: BlockKind,
    /// Body for text blocks, caption for media blocks
    pub content: String,
    pub data: Option<Vec<u8>>,
    pub filename: Option<String>,
}

impl ContentBlock {
    pub fn new(kind: BlockKind) -> Self {
        ContentBlock {
            id: Uuid::new_v4().to_string(),
            kind,
            content: String::new(),
            data: None,
            filename: None,
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock {
            content: content.into(),
            ..ContentBlock::new(BlockKind::Text)
        }
    }

    pub fn media(kind: BlockKind, data: Vec<u8>, filename: impl Into<String>) -> Self {
        ContentBlock {
            data: Some(data),
            filename: Some(filename.into()),
            ..ContentBlock::new(kind)
        }
    }

    fn from_attachment(attachment: &Attachment) -> Self {
        ContentBlock::media(
            attachment.kind.into(),
            attachment.data.clone(),
            attachment.filename.clone(),
        )
    }
}

/// Partial update of a block; `None` leaves the field as it is.
#[derive(Debug, Clone, Default)]
pub struct BlockPatch {
    pub content: Option<String>,
    pub data: Option<Vec<u8>>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Result of composing a block sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockComposition {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// Decomposes a note into editable blocks: the existing text (if any),
/// one block per attachment in order, then an empty text block to type into.
pub fn to_blocks(note: &Note) -> ContentBlocks {
    let mut blocks = Vec::with_capacity(note.attachments.len() + 2);

    if !note.content.trim().is_empty() {
        blocks.push(ContentBlock::text(note.content.clone()));
    }
    blocks.extend(note.attachments.iter().map(ContentBlock::from_attachment));
    blocks.push(ContentBlock::text(""));

    trace!("Decomposed note {} into {} blocks", note.id, blocks.len());
    ContentBlocks { blocks }
}

/// Composes blocks back into note content and attachments.
///
/// Every text block contributes to the content, joined with
/// [`TEXT_BLOCK_SEPARATOR`]; every media block becomes one attachment, even
/// when it has no payload yet.
pub fn from_blocks(blocks: &[ContentBlock]) -> BlockComposition {
    let content = blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Text)
        .map(|b| b.content.as_str())
        .collect::<Vec<_>>()
        .join(TEXT_BLOCK_SEPARATOR);

    let attachments = blocks
        .iter()
        .filter_map(|b| {
            b.kind.attachment_kind().map(|kind| Attachment {
                kind,
                data: b.data.clone().unwrap_or_default(),
                filename: b.filename.clone().unwrap_or_default(),
            })
        })
        .collect();

    BlockComposition {
        content,
        attachments,
    }
}

/// Ordered, never-empty sequence of content blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlocks {
    blocks: Vec<ContentBlock>,
}

impl Default for ContentBlocks {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentBlocks {
    /// A sequence holding one empty text block.
    pub fn new() -> Self {
        ContentBlocks {
            blocks: vec![ContentBlock::text("")],
        }
    }

    /// Wraps existing blocks, falling back to a single empty text block.
    pub fn from_vec(blocks: Vec<ContentBlock>) -> Self {
        if blocks.is_empty() {
            return Self::new();
        }
        ContentBlocks { blocks }
    }

    pub fn as_slice(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ContentBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn compose(&self) -> BlockComposition {
        from_blocks(&self.blocks)
    }

    /// Inserts an empty block of `kind` after `index` and returns its id.
    /// An index past the end appends.
    pub fn insert_after(&mut self, index: usize, kind: BlockKind) -> String {
        self.insert_block_after(index, ContentBlock::new(kind))
    }

    /// Inserts a media block carrying a captured payload after `index`.
    pub fn insert_media_after(
        &mut self,
        index: usize,
        kind: BlockKind,
        data: Vec<u8>,
        filename: impl Into<String>,
    ) -> String {
        self.insert_block_after(index, ContentBlock::media(kind, data, filename))
    }

    fn insert_block_after(&mut self, index: usize, block: ContentBlock) -> String {
        let at = index.saturating_add(1).min(self.blocks.len());
        let id = block.id.clone();
        debug!("Inserting {:?} block {} at position {}", block.kind, id, at);
        self.blocks.insert(at, block);
        id
    }

    /// Applies a partial update. Returns false when no block has that id.
    pub fn update(&mut self, id: &str, patch: BlockPatch) -> bool {
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) else {
            debug!("No block {} to update", id);
            return false;
        };
        if let Some(content) = patch.content {
            block.content = content;
        }
        if let Some(data) = patch.data {
            block.data = Some(data);
        }
        if let Some(filename) = patch.filename {
            block.filename = Some(filename);
        }
        true
    }

    /// Removes a block, reinitializing a single empty text block when the
    /// sequence would become empty. Returns false when no block has that id.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.blocks.len();
        self.blocks.retain(|b| b.id != id);
        let removed = self.blocks.len() != before;
        if self.blocks.is_empty() {
            self.blocks.push(ContentBlock::text(""));
        }
        removed
    }

    /// Replaces all text with `text`: the first text block takes it and the
    /// other text blocks are dropped. Media blocks keep their order.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        let mut text = Some(text.into());
        self.blocks.retain_mut(|block| {
            if block.kind != BlockKind::Text {
                return true;
            }
            match text.take() {
                Some(content) => {
                    block.content = content;
                    true
                }
                None => false,
            }
        });
        if let Some(content) = text {
            self.blocks.push(ContentBlock::text(content));
        }
    }

    /// Drops every image and audio block and returns how many went.
    pub fn remove_media(&mut self) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|b| b.kind == BlockKind::Text);
        let removed = before - self.blocks.len();
        if self.blocks.is_empty() {
            self.blocks.push(ContentBlock::text(""));
        }
        removed
    }

    /// Swaps a block with its neighbour. Moving the first block up or the
    /// last block down leaves the sequence unchanged and returns false.
    pub fn move_block(&mut self, id: &str, direction: Direction) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.blocks.len() => index + 1,
            _ => return false,
        };
        self.blocks.swap(index, target);
        true
    }
}

/// In-progress edit of a new or existing note.
#[derive(Debug, Clone, Default)]
pub struct NoteEditor {
    pub title: String,
    /// Comma separated tags as typed
    pub tags: String,
    pub blocks: ContentBlocks,
    pub reminder_date: Option<chrono::NaiveDate>,
    pub reminder_time: Option<String>,
}

impl NoteEditor {
    /// Starts an editing session, decomposing the note when there is one.
    pub fn open(note: Option<&Note>) -> Self {
        match note {
            Some(note) => NoteEditor {
                title: note.title.clone(),
                tags: note.tags.join(", "),
                blocks: to_blocks(note),
                reminder_date: note.reminder_date,
                reminder_time: note.reminder_time.clone(),
            },
            None => NoteEditor::default(),
        }
    }

    /// Builds the note to save, or `None` when the title, the content and
    /// the attachments are all empty.
    pub fn draft(&self) -> Option<NoteDraft> {
        let BlockComposition {
            content,
            attachments,
        } = self.blocks.compose();

        let draft = NoteDraft {
            title: self.title.trim().to_string(),
            content: content.trim().to_string(),
            attachments,
            tags: parse_tags(Some(self.tags.clone())),
            reminder_date: self.reminder_date,
            reminder_time: self
                .reminder_time
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        };

        if draft.is_empty() {
            debug!("Refusing to build a draft for an empty note");
            return None;
        }
        Some(draft)
    }
}

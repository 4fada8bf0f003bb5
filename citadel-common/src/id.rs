//! Entity ID minting.
//!
//! Every row is keyed by `<uuid>-<tag>`, where the tag marks the entity kind
//! when an ID shows up in logs or API payloads. The tag is diagnostic only;
//! nothing parses it back out.

use uuid::Uuid;

fn tagged(tag: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), tag)
}

pub fn feed_id() -> String {
    tagged("fd")
}

pub fn entry_id() -> String {
    tagged("ntry")
}

pub fn user_id() -> String {
    tagged("usr")
}

pub fn subscription_id() -> String {
    tagged("sub")
}

pub fn timeline_entry_id() -> String {
    tagged("tl-entry")
}

pub fn prompt_id() -> String {
    tagged("prompt")
}

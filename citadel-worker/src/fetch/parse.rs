//! RSS and Atom decoding.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use serde::Deserialize;

use citadel_common::models::{FeedDelta, NewFeedEntry};
use citadel_common::{DbTime, Error, Result};

use super::sanitize;

/// Wire format of a fetched feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

/// Peek at the root element to pick the parser. Atom feeds open with
/// `<feed>`; everything else (including garbage) falls back to RSS.
pub fn detect_format(body: &str) -> FeedFormat {
    let mut reader = quick_xml::Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if start.local_name().as_ref() == b"feed" {
                    return FeedFormat::Atom;
                }
                return FeedFormat::Rss;
            }
            Ok(Event::Eof) | Err(_) => return FeedFormat::Rss,
            Ok(_) => {}
        }
    }
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    #[serde(default)]
    channel: Vec<RssChannel>,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "item")]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: String,
    #[serde(default, rename = "link")]
    links: Vec<String>,
    #[serde(default)]
    guid: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "pubDate")]
    pub_date: String,
}

#[derive(Debug, Deserialize)]
struct AtomDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default, rename = "entry")]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    id: String,
    #[serde(default, rename = "link")]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    updated: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(default, rename = "@href")]
    href: String,
    #[serde(default, rename = "@rel")]
    rel: String,
}

pub fn parse_rss(feed_id: &str, body: &str) -> Result<super::FetchedFeed> {
    let document: RssDocument = quick_xml::de::from_str(body)
        .map_err(|err| Error::invalid(format!("error decoding rss feed: {err}")))?;

    let Some(channel) = document.channel.first() else {
        return Err(Error::invalid("rss feed has no channel"));
    };

    let mut entries = Vec::new();
    for channel in &document.channel {
        for item in &channel.items {
            // First non-empty link wins.
            let mut link = String::new();
            for candidate in &item.links {
                if !candidate.is_empty() {
                    link = candidate.clone();
                    break;
                }
            }

            entries.push(NewFeedEntry {
                feed_id: feed_id.to_string(),
                guid: item.guid.clone(),
                title: sanitize(&item.title),
                description: sanitize(&item.description),
                link,
                publish_time: parse_rss_date(&item.pub_date),
            });
        }
    }

    Ok(super::FetchedFeed {
        delta: FeedDelta {
            title: channel.title.clone(),
            description: channel.description.clone(),
        },
        entries,
    })
}

pub fn parse_atom(feed_id: &str, body: &str) -> Result<super::FetchedFeed> {
    let document: AtomDocument = quick_xml::de::from_str(body)
        .map_err(|err| Error::invalid(format!("error decoding atom feed: {err}")))?;

    let mut entries = Vec::new();
    for entry in &document.entries {
        // Prefer rel="alternate", else the first link with an href.
        let mut link = String::new();
        for candidate in &entry.links {
            if candidate.href.is_empty() {
                continue;
            }
            if link.is_empty() || candidate.rel == "alternate" {
                link = candidate.href.clone();
            }
        }

        // Fall back to content when there is no summary.
        let description = if entry.summary.is_empty() {
            &entry.content
        } else {
            &entry.summary
        };

        entries.push(NewFeedEntry {
            feed_id: feed_id.to_string(),
            guid: entry.id.clone(),
            title: sanitize(&entry.title),
            description: sanitize(description),
            link,
            publish_time: parse_atom_date(&entry.updated),
        });
    }

    Ok(super::FetchedFeed {
        delta: FeedDelta {
            title: document.title,
            description: document.subtitle,
        },
        entries,
    })
}

/// RSS publish dates come in the RFC1123 family, with either a named or a
/// numeric zone; RFC2822 parsing covers both. Unparseable dates become `None`.
fn parse_rss_date(raw: &str) -> Option<DbTime> {
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|parsed| DbTime(parsed.with_timezone(&Utc)))
}

fn parse_atom_date(raw: &str) -> Option<DbTime> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| DbTime(parsed.with_timezone(&Utc)))
}

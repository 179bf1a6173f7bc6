//! RSS channel decoding.

use feedtable_core::FeedEntry;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;

/// Item children that map onto entry fields. Matching is on the qualified
/// name, so `media:title` or `atom:link` never stand in for `title` or `link`.
#[derive(Debug, Clone, Copy)]
enum ItemField {
    Title,
    Link,
    Description,
    PubDate,
    Category,
    Guid,
}

impl ItemField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "title" => Some(Self::Title),
            "link" => Some(Self::Link),
            "description" => Some(Self::Description),
            "pubDate" => Some(Self::PubDate),
            "category" => Some(Self::Category),
            "guid" => Some(Self::Guid),
            _ => None,
        }
    }
}

/// Raw item fields as they appear in the document. A repeated single-valued
/// element overwrites the earlier one.
#[derive(Debug, Default)]
struct RssItem {
    title: String,
    link: String,
    description: String,
    pub_date: String,
    categories: Vec<String>,
    enclosure: Option<String>,
    guid: String,
}

impl RssItem {
    fn set(&mut self, field: ItemField, value: String) {
        match field {
            ItemField::Title => self.title = value,
            ItemField::Link => self.link = value,
            ItemField::Description => self.description = value,
            ItemField::PubDate => self.pub_date = value,
            ItemField::Category => self.categories.push(value),
            ItemField::Guid => self.guid = value,
        }
    }

    fn set_enclosure(&mut self, e: &BytesStart<'_>) -> Result<(), ParseError> {
        let mut url = None;
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"url" {
                url = Some(attr.unescape_value()?.into_owned());
            }
        }
        self.enclosure = url;
        Ok(())
    }
}

impl From<RssItem> for FeedEntry {
    fn from(item: RssItem) -> Self {
        Self {
            title: item.title.trim().to_string(),
            link: item.link.trim().to_string(),
            description: item.description,
            publish_date: item.pub_date.trim().to_string(),
            categories: item
                .categories
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            enclosure: item
                .enclosure
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            guid: item.guid.trim().to_string(),
        }
    }
}

/// Decode an RSS document into its entries, in document order.
///
/// The whole document must decode: a body that is not XML, whose root is not
/// `<rss>`, that lacks a `<channel>`, or that ends inside an open element
/// fails as a unit and yields no entries. Elements the entry model does not
/// carry, including namespaced extensions, are skipped.
///
/// # Errors
///
/// Returns [`ParseError`] describing the first structural problem found.
#[allow(clippy::too_many_lines)]
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedEntry>, ParseError> {
    let xml = std::str::from_utf8(body)?;
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Qualified names of the currently open elements, outermost first.
    let mut open: Vec<String> = Vec::new();
    let mut root_seen = false;
    let mut channel_seen = false;
    let mut item: Option<RssItem> = None;
    let mut field: Option<(ItemField, String)> = None;
    let mut entries = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let qname = e.name();
                let name = std::str::from_utf8(qname.as_ref())?.to_string();
                match (open.len(), name.as_str()) {
                    (0, _) if root_seen => {
                        return Err(ParseError::Schema(format!(
                            "second root element <{name}>"
                        )));
                    }
                    (0, "rss") => root_seen = true,
                    (0, _) => return Err(ParseError::UnexpectedRoot(name.clone())),
                    (1, "channel") => channel_seen = true,
                    (2, "item") if open[1] == "channel" => item = Some(RssItem::default()),
                    (3, child) => {
                        if let Some(current) = item.as_mut() {
                            if child == "enclosure" {
                                current.set_enclosure(&e)?;
                            }
                            field = ItemField::from_name(child).map(|f| (f, String::new()));
                        }
                    }
                    _ => {}
                }
                open.push(name);
            }
            Event::Empty(e) => {
                let qname = e.name();
                let name = std::str::from_utf8(qname.as_ref())?;
                match (open.len(), name) {
                    (0, _) if root_seen => {
                        return Err(ParseError::Schema(format!(
                            "second root element <{name}>"
                        )));
                    }
                    (0, "rss") => root_seen = true,
                    (0, _) => return Err(ParseError::UnexpectedRoot(name.to_string())),
                    (1, "channel") => channel_seen = true,
                    (2, "item") if open[1] == "channel" => {
                        entries.push(FeedEntry::from(RssItem::default()));
                    }
                    (3, child) => {
                        if let Some(current) = item.as_mut() {
                            if child == "enclosure" {
                                current.set_enclosure(&e)?;
                            } else if let Some(f) = ItemField::from_name(child) {
                                current.set(f, String::new());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if open.is_empty() && !root_seen && !e.is_empty() {
                    return Err(ParseError::NoRoot);
                }
                if open.len() == 4 {
                    if let Some((_, buf)) = field.as_mut() {
                        buf.push_str(&e.unescape()?);
                    }
                }
            }
            Event::CData(e) => {
                if open.len() == 4 {
                    if let Some((_, buf)) = field.as_mut() {
                        buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
            }
            Event::End(_) => {
                let Some(name) = open.pop() else {
                    return Err(ParseError::Schema("unmatched closing tag".to_string()));
                };
                match open.len() {
                    3 => {
                        if let (Some(current), Some((f, value))) = (item.as_mut(), field.take()) {
                            current.set(f, value);
                        }
                    }
                    2 if name == "item" => {
                        if let Some(done) = item.take() {
                            entries.push(FeedEntry::from(done));
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(name) = open.last() {
        return Err(ParseError::Schema(format!("document ends inside <{name}>")));
    }
    if !root_seen {
        return Err(ParseError::NoRoot);
    }
    if !channel_seen {
        return Err(ParseError::Schema("missing <channel> element".to_string()));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Do Rzeczy</title>
    <link>https://dorzeczy.pl</link>
    <description><![CDATA[Channel description]]></description>
    <language>pl</language>
    <ttl>15</ttl>
    <image>
      <title>Do Rzeczy</title>
      <url>https://dorzeczy.pl/logo.png</url>
      <link>https://dorzeczy.pl</link>
      <width>144</width>
      <height>40</height>
    </image>
    <item>
      <title>First headline</title>
      <link>https://example.com/articles/1</link>
      <description><![CDATA[<p>Body with <b>markup</b></p>]]></description>
      <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
      <category>Politics</category>
      <category>World</category>
      <enclosure url="https://example.com/img/1.jpg" length="1024" type="image/jpeg"/>
      <guid isPermaLink="false">article-1</guid>
    </item>
    <item>
      <title>Second &amp; last</title>
      <link>https://example.com/articles/2</link>
      <description><![CDATA[Plain text]]></description>
      <pubDate>Tue, 03 Jan 2006 08:00:00 +0100</pubDate>
      <guid>article-2</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_in_document_order() {
        let entries = parse_feed(SAMPLE_RSS.as_bytes()).expect("should parse valid RSS");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].guid, "article-1");
        assert_eq!(entries[1].guid, "article-2");
    }

    #[test]
    fn captures_all_item_fields() {
        let entries = parse_feed(SAMPLE_RSS.as_bytes()).expect("parse");
        let first = &entries[0];
        assert_eq!(first.title, "First headline");
        assert_eq!(first.link, "https://example.com/articles/1");
        assert_eq!(first.description, "<p>Body with <b>markup</b></p>");
        assert_eq!(first.publish_date, "Mon, 02 Jan 2006 15:04:05 -0700");
        assert_eq!(first.categories, vec!["Politics", "World"]);
        assert_eq!(
            first.enclosure.as_deref(),
            Some("https://example.com/img/1.jpg")
        );
    }

    #[test]
    fn unescapes_entities_and_defaults_missing_fields() {
        let entries = parse_feed(SAMPLE_RSS.as_bytes()).expect("parse");
        let second = &entries[1];
        assert_eq!(second.title, "Second & last");
        assert!(second.categories.is_empty());
        assert!(second.enclosure.is_none());
    }

    #[test]
    fn empty_channel_yields_no_entries() {
        let xml = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>x</title></channel></rss>"#;
        let entries = parse_feed(xml.as_bytes()).expect("should parse empty channel");
        assert!(entries.is_empty());
    }

    #[test]
    fn non_xml_body_is_rejected() {
        let result = parse_feed(b"this is not a feed");
        assert!(
            matches!(result, Err(ParseError::NoRoot)),
            "got: {result:?}"
        );
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(matches!(parse_feed(b""), Err(ParseError::NoRoot)));
    }

    #[test]
    fn non_rss_root_is_rejected() {
        let xml = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"><entry/></feed>"#;
        let result = parse_feed(xml.as_bytes());
        assert!(
            matches!(result, Err(ParseError::UnexpectedRoot(ref r)) if r == "feed"),
            "got: {result:?}"
        );
    }

    #[test]
    fn html_page_is_rejected() {
        let html = "<!DOCTYPE html><html><body>Not found</body></html>";
        assert!(matches!(
            parse_feed(html.as_bytes()),
            Err(ParseError::UnexpectedRoot(_))
        ));
    }

    #[test]
    fn missing_channel_is_rejected() {
        let xml = r#"<rss version="2.0"></rss>"#;
        assert!(parse_feed(xml.as_bytes()).is_err());
    }

    #[test]
    fn truncated_document_fails_as_a_whole() {
        let xml = r"<rss><channel><item><title>One</title></item><item><title>Unclosed";
        assert!(parse_feed(xml.as_bytes()).is_err());
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let body = [0x3c, 0x72, 0x73, 0x73, 0x3e, 0xff, 0xfe];
        assert!(matches!(parse_feed(&body), Err(ParseError::Encoding(_))));
    }

    #[test]
    fn leading_byte_order_mark_is_accepted() {
        let xml = "\u{feff}<rss><channel><item><title>A</title></item></channel></rss>";
        let entries = parse_feed(xml.as_bytes()).expect("parse");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "A");
    }

    #[test]
    fn namespaced_siblings_do_not_replace_plain_fields() {
        let xml = r#"<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
  <atom:link href="https://example.com/feed" rel="self"/>
  <item>
    <title>Plain title</title>
    <media:title>Media title</media:title>
    <link>https://example.com/a</link>
    <atom:link href="https://example.com/alt" rel="alternate"/>
    <media:content url="https://example.com/a.jpg"><media:description>x</media:description></media:content>
    <guid>a</guid>
  </item>
  <item><title>Next</title><guid>b</guid></item>
</channel>
</rss>"#;
        let entries = parse_feed(xml.as_bytes()).expect("namespaced extensions are valid RSS");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Plain title");
        assert_eq!(entries[0].link, "https://example.com/a");
        assert!(entries[0].description.is_empty());
        assert_eq!(entries[1].title, "Next");
    }

    #[test]
    fn repeated_enclosure_and_guid_keep_the_last_value() {
        let xml = r#"<rss><channel>
  <item>
    <title>A</title>
    <enclosure url="https://example.com/1.jpg" type="image/jpeg"/>
    <enclosure url="https://example.com/2.jpg" type="image/jpeg"></enclosure>
    <guid>first</guid>
    <guid isPermaLink="false">second</guid>
  </item>
  <item><title>B</title><guid>b</guid></item>
</channel></rss>"#;
        let entries = parse_feed(xml.as_bytes()).expect("repeats are valid RSS");
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].enclosure.as_deref(),
            Some("https://example.com/2.jpg")
        );
        assert_eq!(entries[0].guid, "second");
        assert_eq!(entries[1].guid, "b");
    }

    #[test]
    fn markup_inside_a_field_is_skipped_not_fatal() {
        let xml = r"<rss><channel><item><title>Top <b>bold</b></title><guid>g</guid></item></channel></rss>";
        let entries = parse_feed(xml.as_bytes()).expect("parse");
        assert_eq!(entries[0].title, "Top");
        assert_eq!(entries[0].guid, "g");
    }

    #[test]
    fn self_closing_item_yields_an_empty_entry() {
        let xml = r"<rss><channel><item/><item><title>A</title></item></channel></rss>";
        let entries = parse_feed(xml.as_bytes()).expect("parse");
        assert_eq!(entries.len(), 2);
        assert!(entries[0].title.is_empty());
        assert_eq!(entries[1].title, "A");
    }

    #[test]
    fn mismatched_closing_tag_is_rejected() {
        let xml = r"<rss><channel><item><title>A</link></item></channel></rss>";
        assert!(matches!(
            parse_feed(xml.as_bytes()),
            Err(ParseError::Xml(_))
        ));
    }

    #[test]
    fn unclosed_root_is_rejected() {
        let xml = r"<rss><channel><item><title>A</title></item></channel>";
        assert!(parse_feed(xml.as_bytes()).is_err());
    }
}

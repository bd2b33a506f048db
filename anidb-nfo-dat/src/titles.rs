//! Parser for the AniDB bulk title dump (`anime-titles.xml`).
//!
//! ```text
//! <animetitles>
//!   <anime aid="1">
//!     <title xml:lang="x-jat" type="main">Seikai no Monshou</title>
//!     <title xml:lang="ja" type="official">星界の紋章</title>
//!     <title xml:lang="en" type="syn">Crest of the Stars</title>
//!   </anime>
//! </animetitles>
//! ```
//!
//! Only `official` and `main` titles are kept. Entries are stored in
//! ascending id order and titles in file order, which keeps fuzzy-match
//! tie-breaks deterministic.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use anidb_nfo_core::{TitleType, TitleVariant};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::DatError;

/// Title variants of every known anime, keyed by AniDB id.
#[derive(Debug, Clone, Default)]
pub struct TitleCatalog {
    titles: BTreeMap<u32, Vec<TitleVariant>>,
}

impl TitleCatalog {
    /// Build a catalog from pre-parsed entries. Variants that are neither
    /// `official` nor `main` are dropped, like during XML ingestion.
    pub fn from_entries(entries: impl IntoIterator<Item = (u32, Vec<TitleVariant>)>) -> Self {
        let titles = entries
            .into_iter()
            .map(|(aid, variants)| {
                let kept = variants.into_iter().filter(is_retained).collect();
                (aid, kept)
            })
            .collect();
        Self { titles }
    }

    pub fn parse_file(path: &Path) -> Result<Self, DatError> {
        let file = std::fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<Self, DatError> {
        let mut xml = Reader::from_reader(reader);
        xml.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut titles: BTreeMap<u32, Vec<TitleVariant>> = BTreeMap::new();
        let mut seen_root = false;
        let mut current_aid: Option<u32> = None;
        let mut current_title: Option<PendingTitle> = None;

        loop {
            match xml.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.name().as_ref() {
                    b"animetitles" => seen_root = true,
                    b"anime" => {
                        let aid = parse_aid(e)?;
                        titles.entry(aid).or_default();
                        current_aid = Some(aid);
                    }
                    b"title" if current_aid.is_some() => {
                        current_title = Some(parse_title_attributes(e)?);
                    }
                    _ => {}
                },
                Event::Empty(ref e) if e.name().as_ref() == b"anime" => {
                    let aid = parse_aid(e)?;
                    titles.entry(aid).or_default();
                }
                Event::Text(ref e) => {
                    if let Some(ref mut pending) = current_title {
                        pending.text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(ref e) => {
                    if let Some(ref mut pending) = current_title {
                        pending.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Event::End(ref e) => match e.name().as_ref() {
                    b"title" => {
                        if let (Some(aid), Some(pending)) = (current_aid, current_title.take()) {
                            let variant = pending.into_variant();
                            if is_retained(&variant) {
                                titles.entry(aid).or_default().push(variant);
                            }
                        }
                    }
                    b"anime" => current_aid = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !seen_root {
            return Err(DatError::parse("missing <animetitles> root element"));
        }

        Ok(Self { titles })
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn contains(&self, aid: u32) -> bool {
        self.titles.contains_key(&aid)
    }

    /// All known ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.titles.keys().copied()
    }

    pub fn titles(&self, aid: u32) -> &[TitleVariant] {
        self.titles.get(&aid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate `(aid, variants)` in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[TitleVariant])> {
        self.titles.iter().map(|(aid, v)| (*aid, v.as_slice()))
    }

    /// First variant of the given type and language.
    pub fn find(&self, aid: u32, kind: TitleType, language: &str) -> Option<&TitleVariant> {
        self.titles(aid).iter().find(|t| t.is(kind, language))
    }
}

fn is_retained(variant: &TitleVariant) -> bool {
    matches!(variant.kind, TitleType::Official | TitleType::Main) && !variant.title.is_empty()
}

struct PendingTitle {
    kind: TitleType,
    language: String,
    text: String,
}

impl PendingTitle {
    fn into_variant(self) -> TitleVariant {
        TitleVariant::new(self.text.trim(), self.kind, self.language)
    }
}

fn parse_aid(e: &BytesStart<'_>) -> Result<u32, DatError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"aid" {
            let value = attr.unescape_value()?;
            return value
                .trim()
                .parse()
                .map_err(|_| DatError::parse(format!("invalid anime id: {value}")));
        }
    }
    Err(DatError::parse("<anime> element without aid attribute"))
}

fn parse_title_attributes(e: &BytesStart<'_>) -> Result<PendingTitle, DatError> {
    let mut kind = TitleType::Other;
    let mut language = String::new();
    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            b"type" => kind = TitleType::from_tag(&attr.unescape_value()?),
            b"xml:lang" => language = attr.unescape_value()?.into_owned(),
            _ => {}
        }
    }
    Ok(PendingTitle {
        kind,
        language,
        text: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<animetitles>
    <anime aid="1">
        <title xml:lang="x-jat" type="main">Seikai no Monshou</title>
        <title xml:lang="en" type="syn">Crest of the Stars</title>
        <title xml:lang="ja" type="official">星界の紋章</title>
        <title xml:lang="en" type="official">Crest of the Stars</title>
    </anime>
    <anime aid="14">
        <title xml:lang="x-jat" type="main">Fruits Basket (2019)</title>
        <title xml:lang="x-jat" type="short">FruBa</title>
    </anime>
</animetitles>"#;

    #[test]
    fn keeps_only_official_and_main() {
        let catalog = TitleCatalog::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);

        let titles = catalog.titles(1);
        assert_eq!(titles.len(), 3);
        assert_eq!(titles[0].title, "Seikai no Monshou");
        assert_eq!(titles[0].kind, TitleType::Main);
        assert_eq!(titles[1].language, "ja");
        assert!(titles.iter().all(|t| t.kind != TitleType::Other));
    }

    #[test]
    fn embedded_year_is_recorded() {
        let catalog = TitleCatalog::parse(SAMPLE.as_bytes()).unwrap();
        let titles = catalog.titles(14);
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].year, Some(2019));
    }

    #[test]
    fn missing_aid_is_a_parse_failure() {
        let xml = r#"<animetitles><anime><title type="main" xml:lang="x-jat">X</title></anime></animetitles>"#;
        assert!(matches!(
            TitleCatalog::parse(xml.as_bytes()),
            Err(DatError::Parse(_))
        ));
    }

    #[test]
    fn non_catalog_document_is_rejected() {
        let xml = r#"<?xml version="1.0"?><datafile></datafile>"#;
        assert!(TitleCatalog::parse(xml.as_bytes()).is_err());
    }

    #[test]
    fn truncated_document_is_rejected() {
        let xml = r#"<animetitles><anime aid="1"><title type="main""#;
        assert!(TitleCatalog::parse(xml.as_bytes()).is_err());
    }

    #[test]
    fn escaped_entities_are_decoded() {
        let xml = r#"<animetitles><anime aid="5"><title xml:lang="en" type="official">Tom &amp; Jerry</title></anime></animetitles>"#;
        let catalog = TitleCatalog::parse(xml.as_bytes()).unwrap();
        assert_eq!(catalog.titles(5)[0].title, "Tom & Jerry");
    }
}

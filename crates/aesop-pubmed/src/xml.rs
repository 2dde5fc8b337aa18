//! Parses PubMed efetch XML (`PubmedArticleSet`/`PubmedArticle`) into `Paper`s.
//! Never raises: a malformed document yields whatever articles parsed cleanly
//! before the error, consistent with `fetch_abstracts`'s no-raise contract.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use crate::models::Paper;

struct Builder {
    pmid: Option<String>,
    title: String,
    abstract_text: Option<String>,
    journal: Option<String>,
    publication_year: Option<i32>,
}

impl Builder {
    fn new() -> Self {
        Self { pmid: None, title: String::new(), abstract_text: None, journal: None, publication_year: None }
    }

    fn finish(self) -> Option<Paper> {
        let pmid = self.pmid?;
        if self.title.is_empty() {
            warn!(pmid, "skipping paper with empty title");
            return None;
        }
        Some(Paper {
            pmid,
            title: self.title,
            abstract_text: self.abstract_text,
            publication_year: self.publication_year,
            journal: self.journal,
        })
    }
}

pub fn parse_pubmed_xml(xml: &str) -> Vec<Paper> {
    let mut papers = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<Builder> = None;
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut in_journal_title = false;
    let mut in_pub_date = false;
    let mut in_year = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => current = Some(Builder::new()),
                b"PMID" if current.is_some() => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                b"Title" => in_journal_title = true,
                b"PubDate" => in_pub_date = true,
                b"Year" if in_pub_date => in_year = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if let Some(ref mut p) = current {
                    if in_pmid && p.pmid.is_none() {
                        p.pmid = Some(text.clone());
                    }
                    if in_title {
                        p.title = text.clone();
                    }
                    if in_abstract {
                        p.abstract_text = Some(text.clone());
                    }
                    if in_journal_title {
                        p.journal = Some(text.clone());
                    }
                    if in_year {
                        p.publication_year = text.trim().parse().ok();
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"Title" => in_journal_title = false,
                b"Year" => in_year = false,
                b"PubDate" => in_pub_date = false,
                b"PubmedArticle" => {
                    if let Some(builder) = current.take() {
                        if let Some(paper) = builder.finish() {
                            papers.push(paper);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("XML parse error: {e}");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    papers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_pubmed_xml() {
        let xml = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>12345678</PMID>
      <Article>
        <ArticleTitle>KRAS G12D in pancreatic cancer</ArticleTitle>
        <Abstract><AbstractText>Test abstract.</AbstractText></Abstract>
        <Journal>
          <Title>Nature</Title>
          <JournalIssue><PubDate><Year>2021</Year></PubDate></JournalIssue>
        </Journal>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

        let papers = parse_pubmed_xml(xml);
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].pmid, "12345678");
        assert_eq!(papers[0].title, "KRAS G12D in pancreatic cancer");
        assert_eq!(papers[0].journal.as_deref(), Some("Nature"));
        assert_eq!(papers[0].publication_year, Some(2021));
    }

    #[test]
    fn skips_article_with_empty_title() {
        let xml = r#"<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>1</PMID>
      <Article><ArticleTitle></ArticleTitle></Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;
        let papers = parse_pubmed_xml(xml);
        assert!(papers.is_empty());
    }

    #[test]
    fn malformed_xml_yields_empty_without_panicking() {
        let papers = parse_pubmed_xml("<not valid xml at all");
        assert!(papers.is_empty());
    }
}

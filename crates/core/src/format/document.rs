//! Document formats handled through pandoc.

use serde::{Deserialize, Serialize};

/// A document format known to the pandoc backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Markdown,
    Html,
    Docx,
    Odt,
    Rtf,
    Latex,
    Epub,
    Rst,
    Org,
    MediaWiki,
    Textile,
    DocBook,
    Opml,
    Ipynb,
    Typst,
    AsciiDoc,
    Pptx,
    PlainText,
    Pdf,
    Csv,
    Tsv,
    BibTex,
    BibLatex,
    CslJson,
}

/// Outputs offered for any prose input.
const GENERIC_OUTPUTS: &[DocumentFormat] = &[
    DocumentFormat::Markdown,
    DocumentFormat::Html,
    DocumentFormat::Docx,
    DocumentFormat::Odt,
    DocumentFormat::Rtf,
    DocumentFormat::Pdf,
    DocumentFormat::Latex,
    DocumentFormat::Epub,
    DocumentFormat::Rst,
    DocumentFormat::Org,
    DocumentFormat::MediaWiki,
    DocumentFormat::Textile,
    DocumentFormat::DocBook,
    DocumentFormat::Opml,
    DocumentFormat::Ipynb,
    DocumentFormat::Typst,
    DocumentFormat::AsciiDoc,
    DocumentFormat::Pptx,
    DocumentFormat::PlainText,
];

/// Tables only survive conversion into formats with a table model.
const TABULAR_OUTPUTS: &[DocumentFormat] = &[
    DocumentFormat::Html,
    DocumentFormat::Markdown,
    DocumentFormat::Docx,
    DocumentFormat::Odt,
    DocumentFormat::Latex,
    DocumentFormat::Pdf,
    DocumentFormat::Rst,
    DocumentFormat::AsciiDoc,
    DocumentFormat::PlainText,
];

const BIBLIOGRAPHY_OUTPUTS: &[DocumentFormat] = &[
    DocumentFormat::BibTex,
    DocumentFormat::BibLatex,
    DocumentFormat::CslJson,
    DocumentFormat::Markdown,
];

impl DocumentFormat {
    pub const ALL: &'static [DocumentFormat] = &[
        Self::Markdown,
        Self::Html,
        Self::Docx,
        Self::Odt,
        Self::Rtf,
        Self::Latex,
        Self::Epub,
        Self::Rst,
        Self::Org,
        Self::MediaWiki,
        Self::Textile,
        Self::DocBook,
        Self::Opml,
        Self::Ipynb,
        Self::Typst,
        Self::AsciiDoc,
        Self::Pptx,
        Self::PlainText,
        Self::Pdf,
        Self::Csv,
        Self::Tsv,
        Self::BibTex,
        Self::BibLatex,
        Self::CslJson,
    ];

    /// Stable identifier used in service ids and history records.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Docx => "docx",
            Self::Odt => "odt",
            Self::Rtf => "rtf",
            Self::Latex => "latex",
            Self::Epub => "epub",
            Self::Rst => "rst",
            Self::Org => "org",
            Self::MediaWiki => "mediawiki",
            Self::Textile => "textile",
            Self::DocBook => "docbook",
            Self::Opml => "opml",
            Self::Ipynb => "ipynb",
            Self::Typst => "typst",
            Self::AsciiDoc => "asciidoc",
            Self::Pptx => "pptx",
            Self::PlainText => "plain",
            Self::Pdf => "pdf",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::BibTex => "bibtex",
            Self::BibLatex => "biblatex",
            Self::CslJson => "csljson",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
            Self::Docx => "Word (DOCX)",
            Self::Odt => "OpenDocument Text",
            Self::Rtf => "Rich Text",
            Self::Latex => "LaTeX",
            Self::Epub => "EPUB",
            Self::Rst => "reStructuredText",
            Self::Org => "Org",
            Self::MediaWiki => "MediaWiki",
            Self::Textile => "Textile",
            Self::DocBook => "DocBook",
            Self::Opml => "OPML",
            Self::Ipynb => "Jupyter Notebook",
            Self::Typst => "Typst",
            Self::AsciiDoc => "AsciiDoc",
            Self::Pptx => "PowerPoint (PPTX)",
            Self::PlainText => "Plain Text",
            Self::Pdf => "PDF",
            Self::Csv => "CSV",
            Self::Tsv => "TSV",
            Self::BibTex => "BibTeX",
            Self::BibLatex => "BibLaTeX",
            Self::CslJson => "CSL JSON",
        }
    }

    /// File extensions, preferred first.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Markdown => &["md", "markdown", "mdown"],
            Self::Html => &["html", "htm"],
            Self::Docx => &["docx"],
            Self::Odt => &["odt"],
            Self::Rtf => &["rtf"],
            Self::Latex => &["tex", "latex"],
            Self::Epub => &["epub"],
            Self::Rst => &["rst"],
            Self::Org => &["org"],
            Self::MediaWiki => &["wiki", "mediawiki"],
            Self::Textile => &["textile"],
            Self::DocBook => &["dbk", "docbook"],
            Self::Opml => &["opml"],
            Self::Ipynb => &["ipynb"],
            Self::Typst => &["typ"],
            Self::AsciiDoc => &["adoc", "asciidoc"],
            Self::Pptx => &["pptx"],
            Self::PlainText => &["txt", "text"],
            Self::Pdf => &["pdf"],
            Self::Csv => &["csv"],
            Self::Tsv => &["tsv"],
            Self::BibTex => &["bib"],
            Self::BibLatex => &["bib"],
            Self::CslJson => &["json"],
        }
    }

    /// pandoc reader name, `None` when pandoc cannot read the format.
    pub fn reader(&self) -> Option<&'static str> {
        match self {
            Self::Markdown | Self::PlainText => Some("markdown"),
            Self::Html => Some("html"),
            Self::Docx => Some("docx"),
            Self::Odt => Some("odt"),
            Self::Rtf => Some("rtf"),
            Self::Latex => Some("latex"),
            Self::Epub => Some("epub"),
            Self::Rst => Some("rst"),
            Self::Org => Some("org"),
            Self::MediaWiki => Some("mediawiki"),
            Self::Textile => Some("textile"),
            Self::DocBook => Some("docbook"),
            Self::Opml => Some("opml"),
            Self::Ipynb => Some("ipynb"),
            Self::Typst => Some("typst"),
            Self::Csv => Some("csv"),
            Self::Tsv => Some("tsv"),
            Self::BibTex => Some("bibtex"),
            Self::AsciiDoc
            | Self::Pptx
            | Self::Pdf
            | Self::BibLatex
            | Self::CslJson => None,
        }
    }

    /// pandoc writer name, `None` when pandoc cannot produce the format.
    pub fn writer(&self) -> Option<&'static str> {
        match self {
            Self::Markdown => Some("markdown"),
            Self::Html => Some("html"),
            Self::Docx => Some("docx"),
            Self::Odt => Some("odt"),
            Self::Rtf => Some("rtf"),
            Self::Latex => Some("latex"),
            Self::Epub => Some("epub"),
            Self::Rst => Some("rst"),
            Self::Org => Some("org"),
            Self::MediaWiki => Some("mediawiki"),
            Self::Textile => Some("textile"),
            Self::DocBook => Some("docbook"),
            Self::Opml => Some("opml"),
            Self::Ipynb => Some("ipynb"),
            Self::Typst => Some("typst"),
            Self::AsciiDoc => Some("asciidoc"),
            Self::Pptx => Some("pptx"),
            Self::PlainText => Some("plain"),
            Self::Pdf => Some("pdf"),
            Self::BibTex => Some("bibtex"),
            Self::BibLatex => Some("biblatex"),
            Self::CslJson => Some("csljson"),
            Self::Csv | Self::Tsv => None,
        }
    }

    pub fn is_tabular(&self) -> bool {
        matches!(self, Self::Csv | Self::Tsv)
    }

    pub fn is_bibliography(&self) -> bool {
        matches!(self, Self::BibTex | Self::BibLatex | Self::CslJson)
    }

    /// Outputs this input can be converted into. Never contains the input
    /// format itself and is empty when pandoc cannot read the input.
    pub fn compatible_outputs(&self) -> Vec<DocumentFormat> {
        if self.reader().is_none() {
            return Vec::new();
        }

        let table = if self.is_tabular() {
            TABULAR_OUTPUTS
        } else if self.is_bibliography() {
            BIBLIOGRAPHY_OUTPUTS
        } else {
            GENERIC_OUTPUTS
        };

        table.iter().copied().filter(|f| f != self).collect()
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

//! Language-dependent text: long-form dates and canned fallback copy.

use chrono::{DateTime, Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Es,
    En,
    Pt,
    Fr,
}

impl Language {
    /// Picks the language from a BCP 47 / POSIX tag such as `es-MX` or `pt_BR`.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "es" => Language::Es,
            "pt" => Language::Pt,
            "fr" => Language::Fr,
            _ => Language::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
            Language::Pt => "pt",
            Language::Fr => "fr",
        }
    }

    fn months(self) -> [&'static str; 12] {
        match self {
            Language::Es => [
                "enero", "febrero", "marzo", "abril", "mayo", "junio", "julio", "agosto",
                "septiembre", "octubre", "noviembre", "diciembre",
            ],
            Language::En => [
                "January", "February", "March", "April", "May", "June", "July", "August",
                "September", "October", "November", "December",
            ],
            Language::Pt => [
                "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto",
                "setembro", "outubro", "novembro", "dezembro",
            ],
            Language::Fr => [
                "janvier", "février", "mars", "avril", "mai", "juin", "juillet", "août",
                "septembre", "octobre", "novembre", "décembre",
            ],
        }
    }

    pub fn format_date(self, date: NaiveDate) -> String {
        let month = self.months()[date.month0() as usize];
        match self {
            Language::Es | Language::Pt => format!("{} de {} de {}", date.day(), month, date.year()),
            Language::En => format!("{} {}, {}", month, date.day(), date.year()),
            Language::Fr => format!("{} {} {}", date.day(), month, date.year()),
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            Language::Es => "Certificado de Reconocimiento",
            Language::En => "Certificate of Achievement",
            Language::Pt => "Certificado de Reconhecimento",
            Language::Fr => "Certificat de Réussite",
        }
    }

    pub fn default_body_primary(self) -> &'static str {
        match self {
            Language::Es => "Se otorga el presente certificado a",
            Language::En => "This certificate is proudly presented to",
            Language::Pt => "Este certificado é concedido a",
            Language::Fr => "Ce certificat est décerné à",
        }
    }

    pub fn default_body_secondary(self) -> &'static str {
        match self {
            Language::Es => "por haber completado satisfactoriamente el curso",
            Language::En => "for successfully completing the course",
            Language::Pt => "por ter concluído com êxito o curso",
            Language::Fr => "pour avoir suivi avec succès le cours",
        }
    }
}

/// Parses `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive()))
}

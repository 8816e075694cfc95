//! # Language
//!
//! The small enumerated set of languages the service understands. A session's
//! language selects both the transcription hint (the Whisper `<|xx|>` token)
//! and the summarization collaborator.
//!
//! Per spec, `start.lang` is lower-cased and matched against the known codes;
//! anything absent, empty, or unrecognized falls back to the default (`fr`).
//! The variants are kept as a compile-time-visible set so the registry's
//! fallback is an exhaustive `match` rather than an implicit dictionary lookup.

/// A language the service can transcribe and summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Language {
    English,
    French,
    Arabic,
}

impl Language {
    /// The default language used when none is declared or the declared one is
    /// absent, empty, or unrecognized.
    pub const DEFAULT: Language = Language::French;

    /// Parse an optional, possibly mixed-case `lang` field into a `Language`.
    ///
    /// The input is lower-cased and matched against the known codes; `None`,
    /// empty, or any unrecognized value yields [`Language::DEFAULT`].
    pub fn parse_or_default(lang: Option<&str>) -> Language {
        match lang {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "en" => Language::English,
                "fr" => Language::French,
                "ar" => Language::Arabic,
                _ => Language::DEFAULT,
            },
            None => Language::DEFAULT,
        }
    }

    /// The ISO code for this language, e.g. the `fr` in the Whisper `<|fr|>`
    /// hint token.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::French => "fr",
            Language::Arabic => "ar",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::DEFAULT
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_french() {
        assert_eq!(Language::DEFAULT, Language::French);
        assert_eq!(Language::default(), Language::French);
    }

    #[test]
    fn parse_known_codes() {
        assert_eq!(Language::parse_or_default(Some("en")), Language::English);
        assert_eq!(Language::parse_or_default(Some("fr")), Language::French);
        assert_eq!(Language::parse_or_default(Some("ar")), Language::Arabic);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Language::parse_or_default(Some("EN")), Language::English);
        assert_eq!(Language::parse_or_default(Some("Ar")), Language::Arabic);
    }

    #[test]
    fn parse_absent_empty_or_unknown_defaults() {
        assert_eq!(Language::parse_or_default(None), Language::French);
        assert_eq!(Language::parse_or_default(Some("")), Language::French);
        assert_eq!(Language::parse_or_default(Some("de")), Language::French);
    }

    #[test]
    fn code_round_trips() {
        for lang in [Language::English, Language::French, Language::Arabic] {
            assert_eq!(Language::parse_or_default(Some(lang.code())), lang);
        }
    }
}

//! Load-time options

use std::collections::HashMap;

/// Options recognized when deserializing a model archive.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    extra_files: Vec<String>,
    map_location: bool,
    train_param: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of extra in-archive files to extract into the model properties.
    pub fn with_extra_files<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_files = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Force the graph onto the model's device instead of the placement
    /// recorded in the archive.
    pub fn with_map_location(mut self, map_location: bool) -> Self {
        self.map_location = map_location;
        self
    }

    /// Keep parameters trainable after load instead of freezing them.
    pub fn with_train_param(mut self, train_param: bool) -> Self {
        self.train_param = train_param;
        self
    }

    /// Build options from the historical string-map form.
    ///
    /// Recognized keys: `extraFiles` (comma-separated), `mapLocation`,
    /// `trainParam`. Boolean values parse as case-insensitive `"true"`;
    /// anything else is false.
    pub fn from_map(options: &HashMap<String, String>) -> Self {
        let extra_files = options
            .get("extraFiles")
            .map(|keys| keys.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            extra_files,
            map_location: parse_flag(options.get("mapLocation")),
            train_param: parse_flag(options.get("trainParam")),
        }
    }

    pub fn extra_files(&self) -> &[String] {
        &self.extra_files
    }

    pub fn map_location(&self) -> bool {
        self.map_location
    }

    pub fn train_param(&self) -> bool {
        self.train_param
    }
}

pub(crate) fn parse_flag(value: Option<&String>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let options = LoadOptions::new();
        assert!(options.extra_files().is_empty());
        assert!(!options.map_location());
        assert!(!options.train_param());
    }

    #[test]
    fn test_from_map() {
        let options = LoadOptions::from_map(&map(&[
            ("extraFiles", "config.json,vocab.txt"),
            ("mapLocation", "true"),
            ("trainParam", "true"),
        ]));
        assert_eq!(options.extra_files(), ["config.json", "vocab.txt"]);
        assert!(options.map_location());
        assert!(options.train_param());
    }

    #[test]
    fn test_flag_parsing_compat() {
        // Case-insensitive "true"; everything else is false, unvalidated.
        assert!(parse_flag(Some(&"true".to_string())));
        assert!(parse_flag(Some(&"TRUE".to_string())));
        assert!(parse_flag(Some(&"True".to_string())));
        assert!(!parse_flag(Some(&"yes".to_string())));
        assert!(!parse_flag(Some(&"1".to_string())));
        assert!(!parse_flag(Some(&"".to_string())));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_builder() {
        let options = LoadOptions::new()
            .with_extra_files(["config.json"])
            .with_map_location(true)
            .with_train_param(true);
        assert_eq!(options.extra_files(), ["config.json"]);
        assert!(options.map_location());
        assert!(options.train_param());
    }
}

//! Configuration structures for the label pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{DanfeError, Result};

/// Main configuration for the danfe pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Page pruning configuration.
    pub classifier: ClassifierConfig,

    /// Line-item extraction configuration.
    pub extraction: ExtractionConfig,

    /// Output layout configuration.
    pub layout: LayoutConfig,

    /// Word-split corrections applied to item descriptions.
    pub corrections: CorrectionTable,
}

/// Page classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Lowercase keywords that make a page a keeper regardless of geometry.
    pub keep_headers: Vec<String>,

    /// Blocks smaller than this fraction of the page area are noise.
    pub noise_area_ratio: f32,

    /// Number of horizontal bands the page height is divided into.
    pub vertical_bands: usize,

    /// Number of columns the page width is divided into.
    pub horizontal_columns: usize,

    /// Jaccard similarity at which a page counts as a continuation.
    pub similarity_threshold: f32,

    /// Small fragment: maximum number of qualifying blocks.
    pub small_fragment_max_blocks: usize,

    /// Small fragment: maximum bottom edge as a fraction of page height.
    pub small_fragment_max_bottom: f32,

    /// Small fragment: maximum number of occupied vertical bands.
    pub small_fragment_max_bands: usize,

    /// Scattered fragment: minimum number of blocks.
    pub scattered_min_blocks: usize,

    /// Scattered fragment: `(max density, min vertical spread)` pairs, any one matches.
    pub scattered_limits: Vec<(f32, f32)>,

    /// Product-code fragment: maximum normalized text length.
    pub product_fragment_max_len: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keep_headers: [
                "danfe",
                "fim do danfe",
                "chave de acesso",
                "destinatário",
                "remetente",
                "pedido criado",
                "pieces",
                "peso",
                "item",
                "conteúdo",
                "atributos",
                "quant",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            noise_area_ratio: 0.0003,
            vertical_bands: 8,
            horizontal_columns: 4,
            similarity_threshold: 0.60,
            small_fragment_max_blocks: 3,
            small_fragment_max_bottom: 0.40,
            small_fragment_max_bands: 2,
            scattered_min_blocks: 3,
            scattered_limits: vec![(0.35, 0.70), (0.20, 0.60)],
            product_fragment_max_len: 600,
        }
    }
}

/// Item extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Anchors searched, in order, for the access key.
    pub key_anchors: Vec<String>,

    /// Minimum digit count of an accepted access key.
    pub min_key_digits: usize,

    /// Anchors searched, in order, for the start of the item section.
    pub item_anchors: Vec<String>,

    /// Lines skipped while parsing items.
    pub header_tokens: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            key_anchors: vec![
                "CHAVE DE ACESSO".to_string(),
                "CHAVE DE ACESSO:".to_string(),
                "CHAVE ACESSO".to_string(),
            ],
            min_key_digits: 40,
            item_anchors: vec![
                "ITEM".to_string(),
                "CÓDIGO".to_string(),
                "DESCRIÇÃO".to_string(),
            ],
            header_tokens: ["CONTEÚDO", "ATRIBUTOS", "QUANT.", "DESCRIÇÃO", "CÓDIGO"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Output layout configuration. Lengths are in PDF points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Output page width.
    pub page_width: f32,

    /// Output page height.
    pub page_height: f32,

    /// Column at which item text is wrapped.
    pub wrap_width: usize,

    /// Tables with more rows than this start on a page of their own.
    pub row_threshold: usize,

    /// Resolution used to rasterize artwork pages.
    pub artwork_dpi: u32,

    /// JPEG quality of embedded artwork.
    pub jpeg_quality: u8,

    /// Table font size.
    pub font_size: f32,

    /// Table line leading.
    pub leading: f32,

    /// Cell padding above and below the text.
    pub vertical_padding: f32,

    /// Cell padding left and right of the text.
    pub horizontal_padding: f32,

    /// Grid line width.
    pub grid_width: f32,

    /// Table width as a fraction of the page width.
    pub table_width_ratio: f32,

    /// Description column share of the table width.
    pub description_column_ratio: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 799.0,
            page_height: 1197.0,
            wrap_width: 112,
            row_threshold: 4,
            artwork_dpi: 200,
            jpeg_quality: 85,
            font_size: 12.0,
            leading: 14.0,
            vertical_padding: 2.0,
            horizontal_padding: 3.0,
            grid_width: 0.5,
            table_width_ratio: 0.98,
            description_column_ratio: 0.85,
        }
    }
}

/// A known word split and its repaired form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// Word fragments as they appear, separated by arbitrary whitespace.
    pub fragments: Vec<String>,

    /// Replacement text.
    pub replacement: String,
}

impl Correction {
    pub fn new(fragments: &[&str], replacement: &str) -> Self {
        Self {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            replacement: replacement.to_string(),
        }
    }
}

/// Table of word-split corrections observed in source documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionTable {
    pub entries: Vec<Correction>,
}

impl CorrectionTable {
    /// A table without entries.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add an entry.
    pub fn with(mut self, fragments: &[&str], replacement: &str) -> Self {
        self.entries.push(Correction::new(fragments, replacement));
        self
    }
}

impl Default for CorrectionTable {
    fn default() -> Self {
        Self::empty()
            .with(&["U", "nissex"], "Unissex")
            .with(&["Skat", "ista"], "Skatista")
            .with(&["Ma", "sculino"], "Masculino")
            .with(&["Fe", "minino"], "Feminino")
            .with(&["Pre", "mium"], "Premium")
            .with(&["Cas", "ual"], "Casual")
            .with(&["Cam", "pus"], "Campus")
            .with(&["Tê", "nis"], "Tênis")
            .with(&["Ska", "te"], "Skate")
            .with(&["Con", "fortável"], "Confortável")
            .with(&["Lan", "çamento"], "Lançamento")
            .with(&["Dia", "a", "Dia"], "Dia a Dia")
            .with(&["Su", "per"], "Super")
            .with(&["Li", "nha"], "Linha")
            .with(&["Mo", "retto"], "Moretto")
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| DanfeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| DanfeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_format_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.layout.page_width, 799.0);
        assert_eq!(config.layout.page_height, 1197.0);
        assert_eq!(config.layout.wrap_width, 112);
        assert_eq!(config.layout.row_threshold, 4);
        assert_eq!(config.extraction.min_key_digits, 40);
        assert_eq!(config.classifier.noise_area_ratio, 0.0003);
        assert_eq!(config.classifier.similarity_threshold, 0.60);
        assert_eq!(config.corrections.entries.len(), 15);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"layout": {"wrap_width": 80}}"#).unwrap();
        assert_eq!(config.layout.wrap_width, 80);
        assert_eq!(config.layout.page_height, 1197.0);
        assert_eq!(config.classifier, ClassifierConfig::default());
    }

    #[test]
    fn test_corrections_serialize_as_list() {
        let table = CorrectionTable::empty().with(&["Su", "per"], "Super");
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["replacement"], "Super");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = PipelineConfig::default();
        config.layout.artwork_dpi = 150;
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"layout": {"wrap_width": "wide"}}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(DanfeError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_file(&dir.path().join("missing.json")),
            Err(DanfeError::Io(_))
        ));
    }
}

//! Packing options and their validation.

use std::collections::HashMap;

use crate::error::{PackError, Result};

/// Default segment limit in estimated bytes.
pub const DEFAULT_SEGMENT_LIMIT: i64 = 1_000_000;
/// Default codec-selection effort.
pub const DEFAULT_EFFORT: u32 = 5;

/// What to do with the deflate hint of packed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeflateHint {
    /// Keep each file's own hint
    #[default]
    Keep,
    /// Force the hint on for every file
    True,
    /// Force the hint off for every file
    False,
}

/// What to do with file modification times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModTimePolicy {
    /// Keep each file's own timestamp
    #[default]
    Keep,
    /// Assign every file the latest observed timestamp
    Latest,
}

/// Disposition for an attribute the packer has no layout for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeAction {
    /// Write the whole class verbatim in the file bands
    #[default]
    Pass,
    /// Fail the pack
    Error,
    /// Drop the attribute
    Strip,
}

/// Per-attribute override: an action, or a layout string that defines
/// the attribute so it can be packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeDisposition {
    /// Apply this action
    Action(AttributeAction),
    /// Pack the attribute with this JSR-200 layout
    Layout(String),
}

/// The attribute context an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrContext {
    /// Class attributes
    Class,
    /// Field attributes
    Field,
    /// Method attributes
    Method,
    /// Code attributes
    Code,
}

impl AttrContext {
    /// The two-bit context code used in attribute-definition headers.
    pub const fn code(self) -> i32 {
        match self {
            Self::Class => 0,
            Self::Field => 1,
            Self::Method => 2,
            Self::Code => 3,
        }
    }

    /// Context name for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Field => "field",
            Self::Method => "method",
            Self::Code => "code",
        }
    }
}

/// Options accepted by the packer driver.
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub(crate) segment_limit: i64,
    pub(crate) effort: u32,
    pub(crate) strip_debug: bool,
    pub(crate) keep_file_order: bool,
    pub(crate) deflate_hint: DeflateHint,
    pub(crate) modification_time: ModTimePolicy,
    pub(crate) pass_files: Vec<String>,
    pub(crate) unknown_attribute_action: AttributeAction,
    pub(crate) attribute_overrides: HashMap<(AttrContext, String), AttributeDisposition>,
    pub(crate) gzip: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            segment_limit: DEFAULT_SEGMENT_LIMIT,
            effort: DEFAULT_EFFORT,
            strip_debug: false,
            keep_file_order: true,
            deflate_hint: DeflateHint::Keep,
            modification_time: ModTimePolicy::Keep,
            pass_files: Vec::new(),
            unknown_attribute_action: AttributeAction::Pass,
            attribute_overrides: HashMap::new(),
            gzip: false,
        }
    }
}

impl PackOptions {
    /// Options with every default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the segment limit: `-1` for a single segment, `0` for one
    /// segment per class, otherwise an estimated byte budget.
    pub fn set_segment_limit(&mut self, limit: i64) -> Result<()> {
        if limit < -1 {
            return Err(PackError::InvalidOption {
                option: "segment.limit".to_string(),
                value: limit.to_string(),
            });
        }
        self.segment_limit = limit;
        Ok(())
    }

    /// Set the codec-selection effort, 1..=9.
    pub fn set_effort(&mut self, effort: u32) -> Result<()> {
        if !(1..=9).contains(&effort) {
            return Err(PackError::InvalidOption {
                option: "effort".to_string(),
                value: effort.to_string(),
            });
        }
        self.effort = effort;
        Ok(())
    }

    /// Drop debug attributes (`SourceFile`, `LineNumberTable`,
    /// `LocalVariableTable`, `LocalVariableTypeTable`).
    pub fn set_strip_debug(&mut self, strip: bool) {
        self.strip_debug = strip;
    }

    /// Keep input file order; when false, non-class files are sorted by
    /// name with `META-INF/MANIFEST.MF` first.
    pub fn set_keep_file_order(&mut self, keep: bool) {
        self.keep_file_order = keep;
    }

    /// Set the deflate hint from its option string.
    pub fn set_deflate_hint(&mut self, hint: &str) -> Result<()> {
        self.deflate_hint = match hint {
            "keep" => DeflateHint::Keep,
            "true" => DeflateHint::True,
            "false" => DeflateHint::False,
            other => {
                return Err(PackError::InvalidOption {
                    option: "deflate.hint".to_string(),
                    value: other.to_string(),
                });
            }
        };
        Ok(())
    }

    /// Set the modification-time policy from its option string.
    pub fn set_modification_time(&mut self, policy: &str) -> Result<()> {
        self.modification_time = match policy {
            "keep" => ModTimePolicy::Keep,
            "latest" => ModTimePolicy::Latest,
            other => {
                return Err(PackError::InvalidOption {
                    option: "modification.time".to_string(),
                    value: other.to_string(),
                });
            }
        };
        Ok(())
    }

    /// Add a file name or directory prefix to emit verbatim.
    pub fn add_pass_file(&mut self, name: impl Into<String>) {
        self.pass_files.push(name.into());
    }

    /// Set the default action for unrecognized attributes.
    pub fn set_unknown_attribute_action(&mut self, action: &str) -> Result<()> {
        self.unknown_attribute_action = parse_action(action).ok_or_else(|| {
            PackError::InvalidOption {
                option: "unknown.attribute".to_string(),
                value: action.to_string(),
            }
        })?;
        Ok(())
    }

    /// Override the handling of one attribute in one context: `pass`,
    /// `error`, `strip`, or a JSR-200 layout string.
    pub fn set_attribute_disposition(
        &mut self,
        context: AttrContext,
        name: impl Into<String>,
        value: &str,
    ) {
        let disposition = parse_action(value).map_or_else(
            || AttributeDisposition::Layout(value.to_string()),
            AttributeDisposition::Action,
        );
        self.attribute_overrides.insert((context, name.into()), disposition);
    }

    /// Wrap the output sink in a GZIP framer.
    pub fn set_gzip(&mut self, gzip: bool) {
        self.gzip = gzip;
    }

    /// The effective disposition of an attribute in a context.
    pub(crate) fn attribute_disposition(
        &self,
        context: AttrContext,
        name: &str,
    ) -> AttributeDisposition {
        self.attribute_overrides
            .get(&(context, name.to_string()))
            .cloned()
            .unwrap_or(AttributeDisposition::Action(self.unknown_attribute_action))
    }

    /// Whether `name` matches the pass-file list.
    pub(crate) fn is_pass_file(&self, name: &str) -> bool {
        self.pass_files.iter().any(|p| {
            name == p || (p.ends_with('/') && name.starts_with(p.as_str()))
        })
    }

    /// The configured effort.
    pub const fn effort(&self) -> u32 {
        self.effort
    }
}

fn parse_action(value: &str) -> Option<AttributeAction> {
    match value {
        "pass" => Some(AttributeAction::Pass),
        "error" => Some(AttributeAction::Error),
        "strip" => Some(AttributeAction::Strip),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let options = PackOptions::new();
        assert_eq!(options.segment_limit, DEFAULT_SEGMENT_LIMIT);
        assert_eq!(options.effort, DEFAULT_EFFORT);
        assert!(!options.strip_debug);
        assert!(options.keep_file_order);
        assert_eq!(options.deflate_hint, DeflateHint::Keep);
        assert_eq!(options.modification_time, ModTimePolicy::Keep);
        assert_eq!(options.unknown_attribute_action, AttributeAction::Pass);
        assert!(!options.gzip);
    }

    #[test]
    fn test_effort_out_of_range_is_an_error() {
        let mut options = PackOptions::new();
        assert!(matches!(options.set_effort(0), Err(PackError::InvalidOption { .. })));
        assert!(matches!(options.set_effort(10), Err(PackError::InvalidOption { .. })));
        options.set_effort(9).expect("valid effort");
        assert_eq!(options.effort(), 9);
    }

    #[test]
    fn test_segment_limit_validation() {
        let mut options = PackOptions::new();
        options.set_segment_limit(-1).expect("no-limit value");
        options.set_segment_limit(0).expect("per-class value");
        assert!(options.set_segment_limit(-2).is_err());
    }

    #[test]
    fn test_enum_options_reject_unknown_strings() {
        let mut options = PackOptions::new();
        assert!(options.set_deflate_hint("maybe").is_err());
        assert!(options.set_modification_time("oldest").is_err());
        assert!(options.set_unknown_attribute_action("ignore").is_err());
        options.set_deflate_hint("true").expect("valid");
        options.set_modification_time("latest").expect("valid");
        options.set_unknown_attribute_action("strip").expect("valid");
    }

    #[test]
    fn test_attribute_disposition_lookup() {
        let mut options = PackOptions::new();
        options.set_attribute_disposition(AttrContext::Method, "MyAttr", "error");
        options.set_attribute_disposition(AttrContext::Class, "Custom", "NH[RUH]");

        assert_eq!(
            options.attribute_disposition(AttrContext::Method, "MyAttr"),
            AttributeDisposition::Action(AttributeAction::Error)
        );
        assert_eq!(
            options.attribute_disposition(AttrContext::Class, "Custom"),
            AttributeDisposition::Layout("NH[RUH]".to_string())
        );
        // unconfigured attributes fall back to the default action
        assert_eq!(
            options.attribute_disposition(AttrContext::Field, "Other"),
            AttributeDisposition::Action(AttributeAction::Pass)
        );
    }

    #[test]
    fn test_pass_file_prefixes() {
        let mut options = PackOptions::new();
        options.add_pass_file("images/");
        options.add_pass_file("special.class");
        assert!(options.is_pass_file("images/logo.png"));
        assert!(options.is_pass_file("special.class"));
        assert!(!options.is_pass_file("other.class"));
        assert!(!options.is_pass_file("imagesque.txt"));
    }
}

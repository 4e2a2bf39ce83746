//! Output comment fields.
//!
//! Five fixed slots, each unset or holding a string. Auto-extraction fills
//! slots from module metadata; explicit values from the command line always
//! win over extracted ones.

use crate::decode::ModuleDecoder;
use crate::error::TranscodeError;
use crate::settings::CommentOverrides;

/// The comment slots, in the order they are written to the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommentKind {
    Artist,
    Title,
    Date,
    Message,
    Type,
}

impl CommentKind {
    pub const ALL: [CommentKind; 5] = [
        CommentKind::Artist,
        CommentKind::Title,
        CommentKind::Date,
        CommentKind::Message,
        CommentKind::Type,
    ];

    /// Metadata key read from the module, also used as the output tag name.
    pub fn key(self) -> &'static str {
        match self {
            CommentKind::Artist => "artist",
            CommentKind::Title => "title",
            CommentKind::Date => "date",
            CommentKind::Message => "message",
            CommentKind::Type => "type_long",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentSet {
    slots: [Option<String>; 5],
}

impl CommentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill slots from module metadata; empty values leave a slot unset.
    pub fn from_auto_extraction(module: &dyn ModuleDecoder) -> Result<Self, TranscodeError> {
        let mut set = Self::new();
        for kind in CommentKind::ALL {
            let value = module
                .metadata(kind.key())
                .map_err(TranscodeError::CommentBuildFailed)?;
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                set.set(kind, value);
            }
        }
        Ok(set)
    }

    /// Replace artist, title and date with any explicitly given value.
    pub fn apply_overrides(&mut self, overrides: &CommentOverrides) {
        let fields = [
            (CommentKind::Artist, &overrides.artist),
            (CommentKind::Title, &overrides.title),
            (CommentKind::Date, &overrides.date),
        ];
        for (kind, value) in fields {
            if let Some(value) = value {
                self.set(kind, value.clone());
            }
        }
    }

    pub fn get(&self, kind: CommentKind) -> Option<&str> {
        self.slots[kind.index()].as_deref()
    }

    pub fn set(&mut self, kind: CommentKind, value: String) {
        self.slots[kind.index()] = Some(value);
    }

    /// Set slots as `(key, value)` pairs in slot order.
    pub fn to_key_value_pairs(&self) -> Vec<(&'static str, &str)> {
        CommentKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|value| (kind.key(), value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::RenderParam;
    use crate::error::DecodeError;

    /// Answers metadata from a fixed table; `failing` keys report an error.
    struct MetadataOnly {
        values: Vec<(&'static str, &'static str)>,
        failing: Option<&'static str>,
    }

    impl ModuleDecoder for MetadataOnly {
        fn set_repeat_count(&mut self, _count: u32) -> Result<(), DecodeError> {
            Ok(())
        }

        fn set_render_param(&mut self, _param: RenderParam) -> Result<(), DecodeError> {
            Ok(())
        }

        fn read_interleaved_stereo(&mut self, _sample_rate: u32, _buffer: &mut [f32]) -> usize {
            0
        }

        fn metadata_keys(&self) -> Vec<String> {
            self.values.iter().map(|(k, _)| k.to_string()).collect()
        }

        fn metadata(&self, key: &str) -> Result<Option<String>, DecodeError> {
            if self.failing == Some(key) {
                return Err(DecodeError::Metadata(key.into()));
            }
            Ok(self
                .values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string()))
        }

        fn subsong_names(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn overrides(artist: Option<&str>, title: Option<&str>) -> CommentOverrides {
        CommentOverrides {
            artist: artist.map(str::to_string),
            title: title.map(str::to_string),
            date: None,
        }
    }

    #[test]
    fn explicit_artist_overrides_extracted_one() {
        let mut set = CommentSet::new();
        set.set(CommentKind::Artist, "Foo".into());
        set.set(CommentKind::Message, "hello".into());
        set.set(CommentKind::Type, "ProTracker MOD".into());

        set.apply_overrides(&overrides(Some("Bar"), None));

        assert_eq!(set.get(CommentKind::Artist), Some("Bar"));
        assert_eq!(set.get(CommentKind::Title), None);
        assert_eq!(set.get(CommentKind::Message), Some("hello"));
        assert_eq!(set.get(CommentKind::Type), Some("ProTracker MOD"));
    }

    #[test]
    fn overrides_fill_unset_slots() {
        let mut set = CommentSet::new();
        assert!(set.to_key_value_pairs().is_empty());
        set.apply_overrides(&overrides(None, Some("Tune")));
        assert_eq!(set.to_key_value_pairs(), vec![("title", "Tune")]);
    }

    #[test]
    fn pairs_follow_slot_order_and_skip_unset() {
        let mut set = CommentSet::new();
        set.set(CommentKind::Type, "IT".into());
        set.set(CommentKind::Artist, "A".into());
        set.set(CommentKind::Date, "1995".into());
        assert_eq!(
            set.to_key_value_pairs(),
            vec![("artist", "A"), ("date", "1995"), ("type_long", "IT")]
        );
    }

    #[test]
    fn auto_extraction_skips_empty_values() {
        let module = MetadataOnly {
            values: vec![
                ("artist", ""),
                ("title", "Song"),
                ("date", ""),
                ("type_long", "ProTracker MOD"),
            ],
            failing: None,
        };
        let set = CommentSet::from_auto_extraction(&module).unwrap();
        assert_eq!(
            set.to_key_value_pairs(),
            vec![("title", "Song"), ("type_long", "ProTracker MOD")]
        );
    }

    #[test]
    fn auto_extraction_failure_is_reported() {
        let module = MetadataOnly {
            values: vec![("artist", "A")],
            failing: Some("date"),
        };
        assert!(matches!(
            CommentSet::from_auto_extraction(&module),
            Err(TranscodeError::CommentBuildFailed(DecodeError::Metadata(_)))
        ));
    }
}

//! Field/value records delivered by an event source.

use std::fmt;

/// One record delivered by a protocol or monitoring channel.
///
/// Field names are normalized to lower case on construction and every lookup
/// is case-insensitive, so `Channel`, `channel` and `CHANNEL` address the same
/// field. Fields keep their arrival order; if a name repeats, the first
/// occurrence wins for lookups.
///
/// # Examples
///
/// ```
/// use evmatch_core::Event;
///
/// let event = Event::new([("Event", "Newchannel"), ("Channel", "PJSIP/alice-0001")]);
/// assert_eq!(event.get("channel"), Some("PJSIP/alice-0001"));
/// assert_eq!(event.name(), Some("Newchannel"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    fields: Vec<(String, String)>,
}

impl Event {
    /// Field that carries the event type name.
    pub const NAME_FIELD: &'static str = "event";

    /// Field used for plain-text events and single-regex patterns.
    pub const VALUE_FIELD: &'static str = "value";

    /// Creates an event from (name, value) pairs.
    pub fn new<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Creates a single-field event holding `value` under [`Event::VALUE_FIELD`].
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            fields: vec![(Self::VALUE_FIELD.to_string(), value.into())],
        }
    }

    /// Looks up a field value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the event carries the named field.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The event type name, if the event carries one.
    pub fn name(&self) -> Option<&str> {
        self.get(Self::NAME_FIELD)
    }

    /// Iterates fields in arrival order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the event has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Event {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {:?}", k, v)?;
        }
        write!(f, "}}")
    }
}

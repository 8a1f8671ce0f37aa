use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Broadcast period an entry belongs to. Serialized lowercase.
///
/// Reading goes through [`FromStr`], so stored data, request bodies and path
/// segments all accept the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub const ALL: [Season; 4] = [
        Season::Winter,
        Season::Spring,
        Season::Summer,
        Season::Autumn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            other => Err(format!("unknown season '{}'", other)),
        }
    }
}

impl TryFrom<String> for Season {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Download links keyed by distribution channel.
///
/// Older stored data used the channel names `baidu`, `ali` and `quark`; those
/// keys are still accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, alias = "baidu", deserialize_with = "non_empty_string")]
    pub primary: Option<String>,
    #[serde(default, alias = "ali", deserialize_with = "non_empty_string")]
    pub secondary: Option<String>,
    #[serde(default, alias = "quark", deserialize_with = "non_empty_string")]
    pub tertiary: Option<String>,
}

/// Everything an entry carries except its id. Input to create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub original_title: String,
    pub season: Season,
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub day: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub genre: Vec<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: f64,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub poster: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub director: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub screenwriter: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub cast: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub broadcast: String,
    #[serde(default, deserialize_with = "lenient_links")]
    pub links: Links,
}

impl EntryDraft {
    /// Blank draft for the given season.
    pub fn new(title: impl Into<String>, season: Season) -> Self {
        Self {
            title: title.into(),
            original_title: String::new(),
            season,
            year: String::new(),
            day: String::new(),
            genre: Vec::new(),
            rating: 0.0,
            poster: None,
            desc: String::new(),
            director: String::new(),
            screenwriter: String::new(),
            cast: Vec::new(),
            broadcast: String::new(),
            links: Links::default(),
        }
    }
}

/// A catalog item. Field order matches the persisted JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub original_title: String,
    pub season: Season,
    #[serde(default, deserialize_with = "lenient_text")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub day: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub genre: Vec<String>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: f64,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub poster: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub director: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub screenwriter: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub cast: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub broadcast: String,
    #[serde(default, deserialize_with = "lenient_links")]
    pub links: Links,
}

impl Entry {
    pub fn from_draft(id: String, draft: EntryDraft) -> Self {
        let EntryDraft {
            title,
            original_title,
            season,
            year,
            day,
            genre,
            rating,
            poster,
            desc,
            director,
            screenwriter,
            cast,
            broadcast,
            links,
        } = draft;
        Self {
            id,
            title,
            original_title,
            season,
            year,
            day,
            genre,
            rating,
            poster,
            desc,
            director,
            screenwriter,
            cast,
            broadcast,
            links,
        }
    }

    pub fn to_draft(&self) -> EntryDraft {
        EntryDraft {
            title: self.title.clone(),
            original_title: self.original_title.clone(),
            season: self.season,
            year: self.year.clone(),
            day: self.day.clone(),
            genre: self.genre.clone(),
            rating: self.rating,
            poster: self.poster.clone(),
            desc: self.desc.clone(),
            director: self.director.clone(),
            screenwriter: self.screenwriter.clone(),
            cast: self.cast.clone(),
            broadcast: self.broadcast.clone(),
            links: self.links.clone(),
        }
    }
}

/// Entries partitioned by season. Insertion order within a season is display
/// order. Always serialized with all four keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub winter: Vec<Entry>,
    #[serde(default)]
    pub spring: Vec<Entry>,
    #[serde(default)]
    pub summer: Vec<Entry>,
    #[serde(default)]
    pub autumn: Vec<Entry>,
}

impl Catalog {
    pub fn season(&self, season: Season) -> &[Entry] {
        match season {
            Season::Winter => &self.winter,
            Season::Spring => &self.spring,
            Season::Summer => &self.summer,
            Season::Autumn => &self.autumn,
        }
    }

    pub fn season_mut(&mut self, season: Season) -> &mut Vec<Entry> {
        match season {
            Season::Winter => &mut self.winter,
            Season::Spring => &mut self.spring,
            Season::Summer => &mut self.summer,
            Season::Autumn => &mut self.autumn,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        Season::ALL
            .into_iter()
            .flat_map(move |season| self.season(season).iter())
    }

    pub fn len(&self) -> usize {
        Season::ALL.iter().map(|s| self.season(*s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Season and index of the entry with the given id.
    pub fn locate(&self, id: &str) -> Option<(Season, usize)> {
        Season::ALL.into_iter().find_map(|season| {
            self.season(season)
                .iter()
                .position(|e| e.id == id)
                .map(|idx| (season, idx))
        })
    }
}

/// Parses a rating the way a lenient form field would: numbers pass through,
/// numeric strings are parsed, anything else (including NaN/inf) becomes 0.
fn lenient_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawRating {
        Number(f64),
        Text(String),
        Other(Value),
    }

    let value = match RawRating::deserialize(deserializer)? {
        RawRating::Number(n) => n,
        RawRating::Text(s) => parse_float_prefix(&s).unwrap_or(0.0),
        RawRating::Other(_) => 0.0,
    };
    Ok(if value.is_finite() { value } else { 0.0 })
}

/// Longest leading decimal number in `input`, e.g. "8.7 / 10" -> 8.7.
pub(crate) fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    s[..end].trim_end_matches('.').parse().ok()
}

/// Accepts a sequence or a legacy comma-joined string. Blank items are dropped.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .map(value_text)
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Value::String(joined) => split_cast(&joined),
        _ => Vec::new(),
    })
}

/// Splits a legacy comma-delimited cast string.
pub fn split_cast(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = value_text(Value::deserialize(deserializer)?);
    Ok(Some(text).filter(|s| !s.trim().is_empty()))
}

/// Text field that tolerates `null` and scalars written by older data.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(Value::deserialize(deserializer)?))
}

fn lenient_links<'de, D>(deserializer: D) -> Result<Links, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => Ok(serde_json::from_value(value).unwrap_or_default()),
        _ => Ok(Links::default()),
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

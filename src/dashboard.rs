//! Summary statistics and CSV export over the voter collection.

use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::model::{api::voter::VoterRecord, common::party::Party};

/// File name offered for the CSV download.
pub const EXPORT_FILE_NAME: &str = "voter_data.csv";

pub const EXPORT_HEADER: [&str; 11] = [
    "ID",
    "Name",
    "Age",
    "Party",
    "Address",
    "# People",
    "Designation",
    "Latitude",
    "Longitude",
    "Notes",
    "Date Added",
];

/// Number of voters per party, in the order each party was first encountered.
/// Parties with no voters are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyCounts(Vec<(Party, u64)>);

impl PartyCounts {
    pub fn tally(parties: impl IntoIterator<Item = Party>) -> Self {
        let mut counts: Vec<(Party, u64)> = Vec::new();
        for party in parties {
            match counts.iter_mut().find(|(p, _)| *p == party) {
                Some((_, count)) => *count += 1,
                None => counts.push((party, 1)),
            }
        }
        Self(counts)
    }

    pub fn get(&self, party: Party) -> Option<u64> {
        self.0.iter().find(|(p, _)| *p == party).map(|(_, c)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct parties counted.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Party, u64)> + '_ {
        self.0.iter().copied()
    }
}

impl Serialize for PartyCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (party, count) in &self.0 {
            map.serialize_entry(party, count)?;
        }
        map.end()
    }
}

/// The party with the most voters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Leader {
    pub party: Party,
    pub count: u64,
}

/// One bar of the party support chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartEntry {
    pub party: Party,
    pub count: u64,
    pub color: &'static str,
}

/// Everything the dashboard page displays apart from the table itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_voters: usize,
    pub party_counts: PartyCounts,
    pub leading_party: Option<Leader>,
    pub chart: Vec<ChartEntry>,
}

impl DashboardSummary {
    pub fn from_records(records: &[VoterRecord]) -> Self {
        let party_counts = counts_by_party(records);
        Self {
            total_voters: records.len(),
            leading_party: leading_party(&party_counts),
            chart: chart_data(&party_counts),
            party_counts,
        }
    }
}

pub fn counts_by_party(records: &[VoterRecord]) -> PartyCounts {
    PartyCounts::tally(records.iter().map(|r| r.party))
}

/// The party with the strictly greatest count. Ties go to whichever party
/// was encountered first; `None` when nothing has been counted.
pub fn leading_party(counts: &PartyCounts) -> Option<Leader> {
    counts.iter().fold(None, |leader, (party, count)| match leader {
        Some(Leader { count: best, .. }) if best >= count => leader,
        _ => Some(Leader { party, count }),
    })
}

/// Chart bars, largest first. Equal counts keep encounter order.
pub fn chart_data(counts: &PartyCounts) -> Vec<ChartEntry> {
    let mut entries: Vec<_> = counts
        .iter()
        .map(|(party, count)| ChartEntry {
            party,
            count,
            color: party.color(),
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

/// Render every record as CSV, one row per voter under [`EXPORT_HEADER`].
/// Fields containing delimiters, quotes or newlines are quoted, with
/// embedded quotes doubled.
pub fn export_csv(records: &[VoterRecord]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;
    for record in records {
        writer.write_record([
            record.id.to_string(),
            record.name.clone(),
            record.age.to_string(),
            record.party.to_string(),
            record.address.clone().unwrap_or_default(),
            record
                .people_in_house
                .map(|p| p.to_string())
                .unwrap_or_default(),
            record.designation.clone().unwrap_or_default(),
            record.lat.to_string(),
            record.lng.to_string(),
            record.notes.clone().unwrap_or_default(),
            record.created_at.clone(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    // Every field came from a `String`, so the output is valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

//! MEDLINE (`rettype=medline`) record parsing.
//!
//! Each line is `TAG - value` with the tag left-aligned in a four column field. Values that wrap
//! continue on lines indented by six spaces. Records are separated by blank lines.

const CONTINUATION: &str = "      ";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MedlineRecord {
	fields: Vec<(String, String)>,
}
impl MedlineRecord {
	/// First value stored under `tag`.
	pub fn get(&self, tag: &str) -> Option<&str> {
		self.fields.iter().find(|(key, _)| key == tag).map(|(_, value)| value.as_str())
	}

	pub fn pmid(&self) -> Option<&str> {
		self.get("PMID")
	}

	/// Title and abstract joined by a space, skipping whichever is absent or blank.
	pub fn text(&self) -> String {
		[self.get("TI"), self.get("AB")]
			.into_iter()
			.flatten()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(" ")
	}

	fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

pub fn parse(raw: &str) -> Vec<MedlineRecord> {
	let mut records = Vec::new();
	let mut current = MedlineRecord::default();

	for line in raw.lines() {
		let line = line.trim_end();

		if line.is_empty() {
			if !current.is_empty() {
				records.push(std::mem::take(&mut current));
			}

			continue;
		}

		if let Some(rest) = line.strip_prefix(CONTINUATION) {
			if let Some((_, value)) = current.fields.last_mut() {
				if !value.is_empty() {
					value.push(' ');
				}

				value.push_str(rest.trim_start());
			}

			continue;
		}

		let Some((tag, value)) = split_tagged(line) else {
			tracing::debug!(line, "Skipping malformed MEDLINE line.");

			continue;
		};

		current.fields.push((tag.to_string(), value.to_string()));
	}

	if !current.is_empty() {
		records.push(current);
	}

	records
}

fn split_tagged(line: &str) -> Option<(&str, &str)> {
	let (tag, rest) = line.split_at_checked(4)?;
	let value = rest.strip_prefix("- ").or_else(|| rest.strip_prefix("-"))?;
	let tag = tag.trim_end();

	if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
		return None;
	}

	Some((tag, value.trim()))
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = "
PMID- 33024307
OWN - NLM
TI  - The inhibition of AICAR suppresses the phosphorylation
      of TBC1D1.
AB  - TBC1D1 phosphorylation is increased by AICAR, but only
      responds minimally to contraction.
AU  - Doe J
AU  - Roe R

PMID- 1
TI  - Title only.
";

	#[test]
	fn splits_records_and_joins_continuations() {
		let records = parse(SAMPLE);

		assert_eq!(records.len(), 2);
		assert_eq!(records[0].pmid(), Some("33024307"));
		assert_eq!(
			records[0].get("TI"),
			Some("The inhibition of AICAR suppresses the phosphorylation of TBC1D1.")
		);
		assert_eq!(records[0].get("AU"), Some("Doe J"));
		assert_eq!(records[0].get("OWN"), Some("NLM"));
	}

	#[test]
	fn text_is_title_then_abstract() {
		let records = parse(SAMPLE);

		assert_eq!(
			records[0].text(),
			"The inhibition of AICAR suppresses the phosphorylation of TBC1D1. TBC1D1 \
			 phosphorylation is increased by AICAR, but only responds minimally to contraction."
		);
		assert_eq!(records[1].text(), "Title only.");
	}

	#[test]
	fn garbage_yields_no_records() {
		assert!(parse("").is_empty());
		assert!(parse("Error occurred: bad id\n").is_empty());
	}
}

use backdex_protocol::FileRecord;

/// Split a free-text query into lowercased prefix terms.
///
/// Duplicates are dropped so a repeated word does not count twice when
/// ranking.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let word = word.to_lowercase();
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Break a field into lowercase alphanumeric runs.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Searchable terms of a record: tokens of name, path and mode string, plus
/// the whole lowercased name so `report.pdf` matches literally.
pub fn record_terms(record: &FileRecord) -> Vec<String> {
    let mut terms: Vec<String> = tokenize(&record.name)
        .chain(tokenize(&record.path))
        .chain(tokenize(&record.mode_string))
        .collect();
    terms.push(record.name.to_lowercase());
    terms.sort_unstable();
    terms.dedup();
    terms
}

/// How many query terms prefix at least one record term. Zero means no match.
pub fn match_score(record_terms: &[String], query_terms: &[String]) -> usize {
    query_terms
        .iter()
        .filter(|q| record_terms.iter().any(|t| t.starts_with(q.as_str())))
        .count()
}

/// Rank `(score, record)` pairs: higher score first, then path order.
pub(crate) fn rank(hits: &mut [(usize, FileRecord)]) {
    hits.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.path.cmp(&b.path)));
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;

//! Designator normalisation
//!
//! A designator such as `R12` is split into its textual part and its number so
//! that sorting by the normalised key yields `R1, R2, R10` rather than the
//! lexicographic `R1, R10, R2`.
//!
//! Accepted form: `<letters><digits><anything>`. `Q12_a` is valid (`Q` + `12` +
//! `_a`), `Q_a12` is not. The number is limited to four digits.

use std::cmp::Ordering;

/// Largest designator number accepted by the normaliser.
pub const MAX_DESIGNATOR_NUMBER: u64 = 9999;

/// Character KiCad writes in place of the number of an unannotated symbol.
pub const UNANNOTATED_MARKER: char = '?';

/// Reasons a designator cannot be normalised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDesignator {
    /// The schematic was never annotated (`R?`).
    #[error("designator '{0}' is not annotated, run the annotation tool on the schematic first")]
    Unannotated(String),
    /// The number exceeds [`MAX_DESIGNATOR_NUMBER`].
    #[error("designator '{designator}' has number {number}, which exceeds {max}")]
    NumberTooLarge {
        designator: String,
        number: u64,
        max: u64,
    },
    /// Does not follow `<letters><digits><suffix>`.
    #[error("designator '{0}' does not have the form <letters><digits><suffix>")]
    Malformed(String),
}

/// Split a designator into `(prefix + suffix, number)`.
pub fn split(designator: &str) -> Result<(String, u64), InvalidDesignator> {
    if designator.contains(UNANNOTATED_MARKER) {
        return Err(InvalidDesignator::Unannotated(designator.to_string()));
    }

    let alpha_end = designator
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(designator.len());
    let rest = &designator[alpha_end..];
    let digit_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    if alpha_end == 0 || digit_end == 0 {
        return Err(InvalidDesignator::Malformed(designator.to_string()));
    }

    let digits = &rest[..digit_end];
    let suffix = &rest[digit_end..];
    // Anything longer than 20 digits would not fit a u64 and is out of range anyway.
    let number = digits.parse::<u64>().unwrap_or(u64::MAX);

    let mut text = designator[..alpha_end].to_string();
    text.push_str(suffix);
    Ok((text, number))
}

/// Normalised sort key: textual part followed by the zero padded number.
///
/// ```
/// assert_eq!(bomkit::designator::normalize("Q12_a").unwrap(), "Q_a00012");
/// ```
pub fn normalize(designator: &str) -> Result<String, InvalidDesignator> {
    let (text, number) = split(designator)?;
    if number > MAX_DESIGNATOR_NUMBER {
        return Err(InvalidDesignator::NumberTooLarge {
            designator: designator.to_string(),
            number,
            max: MAX_DESIGNATOR_NUMBER,
        });
    }
    Ok(format!("{}{:05}", text, number))
}

/// Compare two designators by their normalised keys.
///
/// Designators that fail to normalise sort after valid ones, in plain string order.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (normalize(a), normalize(b)) {
        (Ok(ka), Ok(kb)) => ka.cmp(&kb).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sort designators in place, failing on the first invalid one.
pub fn sort(designators: &mut [String]) -> Result<(), InvalidDesignator> {
    let mut keyed = designators
        .iter()
        .map(|d| normalize(d).map(|k| (k, d.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort();
    for (slot, (_, d)) in designators.iter_mut().zip(keyed) {
        *slot = d;
    }
    Ok(())
}

/// Row key of a set of designators: sorted, de-duplicated, comma joined.
pub fn row_key<I, S>(designators: I) -> Result<String, InvalidDesignator>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut all: Vec<String> = designators
        .into_iter()
        .map(|d| d.as_ref().to_string())
        .collect();
    sort(&mut all)?;
    all.dedup();
    Ok(all.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorting_is_numeric() {
        let mut refs: Vec<String> = ["Z9", "A1", "Q10", "Q11", "Q1", "Q2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        sort(&mut refs).unwrap();
        assert_eq!(refs.join(","), "A1,Q1,Q2,Q10,Q11,Z9");
    }

    #[test]
    fn test_number_too_large() {
        let err = normalize("Z10000").unwrap_err();
        assert!(matches!(err, InvalidDesignator::NumberTooLarge { number: 10000, .. }));
        assert_eq!(normalize("Z9999").unwrap(), "Z09999");
    }

    #[test]
    fn test_unannotated_is_distinct() {
        assert_eq!(
            normalize("R?"),
            Err(InvalidDesignator::Unannotated("R?".to_string()))
        );
        assert!(matches!(normalize("R1?"), Err(InvalidDesignator::Unannotated(_))));
    }

    #[test]
    fn test_suffix_grammar() {
        assert_eq!(split("Q12_a").unwrap(), ("Q_a".to_string(), 12));
        assert!(matches!(split("Q_a12"), Err(InvalidDesignator::Malformed(_))));
        assert!(matches!(split("12R"), Err(InvalidDesignator::Malformed(_))));
        assert!(matches!(split(""), Err(InvalidDesignator::Malformed(_))));
    }

    #[test]
    fn test_huge_number_does_not_overflow() {
        let err = normalize("R123456789012345678901234567890").unwrap_err();
        assert!(matches!(err, InvalidDesignator::NumberTooLarge { .. }));
    }

    #[test]
    fn test_row_key() {
        assert_eq!(row_key(["C219", "C202"]).unwrap(), "C202,C219");
        assert_eq!(row_key(["R1", "R1"]).unwrap(), "R1");
        assert!(row_key(["R1", "R?"]).is_err());
    }

    #[test]
    fn test_compare_puts_invalid_last() {
        assert_eq!(compare("R2", "R10"), Ordering::Less);
        assert_eq!(compare("R?", "R10"), Ordering::Greater);
    }
}

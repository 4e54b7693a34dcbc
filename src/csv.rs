use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::replay::{Attempt, Outcome};
use crate::{Amount, Percent};

/// Errors that can occur when reading attempts or writing outcomes
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: missing user")]
    MissingUser { line: usize },

    #[error("failed to write outcome: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct InputRow {
    user: String,
    balance: Option<f64>,
    payload: String,
    // kept as text: amounts are parsed the way the input field parses keystrokes
    purchase: String,
    cashback_use: Option<String>,
    percent: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    user: &'a str,
    merchant: &'a str,
    store: &'a str,
    outcome: String,
    purchase: String,
    cashback_used: String,
    amount_payable: String,
    cashback_earned: String,
    transaction: String,
    reason: &'a str,
}

/// Read payment attempts from a csv file
pub fn read_attempts(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Attempt, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            if row.user.is_empty() {
                return Err(CsvError::MissingUser { line });
            }
            Ok(Attempt {
                user: row.user,
                balance: row.balance.map(|b| Amount::from_float(b).non_negative()),
                payload: row.payload,
                purchase: Amount::parse_input(&row.purchase),
                cashback_use: row
                    .cashback_use
                    .as_deref()
                    .map(Amount::parse_input)
                    .unwrap_or_default(),
                percent: row.percent.map(Percent::from_float),
            })
        }))
}

/// Write attempt outcomes in csv format
pub fn write_outcomes<'a, W: io::Write>(
    writer: W,
    outcomes: impl IntoIterator<Item = &'a Outcome>,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(writer);

    for outcome in outcomes {
        let row = OutputRow {
            user: &outcome.user,
            merchant: outcome.merchant.as_deref().unwrap_or_default(),
            store: outcome.store.as_deref().unwrap_or_default(),
            outcome: outcome.phase.to_string(),
            purchase: outcome.split.purchase_amount.to_string(),
            cashback_used: outcome.split.capped_cashback_used.to_string(),
            amount_payable: outcome.split.amount_payable.to_string(),
            cashback_earned: outcome.cashback_earned.to_string(),
            transaction: outcome
                .transaction
                .map(|id| id.to_string())
                .unwrap_or_default(),
            reason: outcome.reason.as_deref().unwrap_or_default(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Phase;
    use crate::model::CashbackSplit;
    use crate::split::compute_split;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const HEADER: &str = "user,balance,payload,purchase,cashback_use,percent\n";

    #[test]
    fn read_json_payload_row() {
        let file = write_csv(&format!(
            "{HEADER}u1,10,\"{{\"\"type\"\":\"\"LOCALIZEI_MERCHANT_QR\"\",\"\"merchantId\"\":\"\"m1\"\"}}\",150.00,10,5\n"
        ));
        let results: Vec<_> = read_attempts(file.path()).unwrap().collect();
        assert_eq!(results.len(), 1);

        let attempt = results.into_iter().next().unwrap().unwrap();
        assert_eq!(attempt.user, "u1");
        assert_eq!(attempt.balance, Some(Amount::from_float(10.0)));
        assert_eq!(
            attempt.payload,
            r#"{"type":"LOCALIZEI_MERCHANT_QR","merchantId":"m1"}"#
        );
        assert_eq!(attempt.purchase, Amount::from_float(150.0));
        assert_eq!(attempt.cashback_use, Amount::from_float(10.0));
        assert_eq!(attempt.percent, Some(Percent::from_float(5.0)));
    }

    #[test]
    fn read_optional_columns_and_comma_decimal() {
        let file = write_csv(&format!(
            "{HEADER}u2,,https://x/cashback/loja/m42,\"12,50\",,\n"
        ));
        let attempt = read_attempts(file.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();

        assert_eq!(attempt.balance, None);
        assert_eq!(attempt.purchase, Amount::from_float(12.5));
        assert_eq!(attempt.cashback_use, Amount::ZERO);
        assert_eq!(attempt.percent, None);
    }

    #[test]
    fn read_garbage_amount_as_zero() {
        let file = write_csv(&format!("{HEADER}u3,,x,abc,,\n"));
        let attempt = read_attempts(file.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(attempt.purchase, Amount::ZERO);
    }

    #[test]
    fn read_returns_error_for_bad_balance() {
        let file = write_csv(&format!("{HEADER}u1,lots,x,1,,\n"));
        let results: Vec<_> = read_attempts(file.path()).unwrap().collect();
        assert!(matches!(results[0], Err(CsvError::Parse { line: 2, .. })));
    }

    #[test]
    fn read_returns_error_for_missing_user() {
        let file = write_csv(&format!("{HEADER},,x,1,,\n"));
        let results: Vec<_> = read_attempts(file.path()).unwrap().collect();
        assert!(matches!(results[0], Err(CsvError::MissingUser { line: 2 })));
    }

    #[test]
    fn open_missing_file_fails() {
        let result = read_attempts("definitely/not/here.csv");
        assert!(matches!(result, Err(CsvError::Open { .. })));
    }

    #[test]
    fn write_outcome_rows() {
        let outcomes = vec![
            Outcome {
                user: "u1".to_string(),
                merchant: Some("m1".to_string()),
                store: Some("s1".to_string()),
                phase: Phase::Approved,
                split: compute_split(
                    Amount::from_float(150.0),
                    Amount::from_float(10.0),
                    Amount::from_float(10.0),
                ),
                cashback_earned: Amount::from_float(7.0),
                transaction: None,
                reason: None,
            },
            Outcome {
                user: "u2".to_string(),
                merchant: None,
                store: None,
                phase: Phase::Scanning,
                split: CashbackSplit::default(),
                cashback_earned: Amount::ZERO,
                transaction: None,
                reason: Some("unrecognized merchant QR payload".to_string()),
            },
        ];

        let mut out = Vec::new();
        write_outcomes(&mut out, &outcomes).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "user,merchant,store,outcome,purchase,cashback_used,amount_payable,cashback_earned,transaction,reason"
        );
        assert_eq!(lines[1], "u1,m1,s1,approved,150.00,10.00,140.00,7.00,,");
        assert_eq!(
            lines[2],
            "u2,,,scanning,0.00,0.00,0.00,0.00,,unrecognized merchant QR payload"
        );
    }
}

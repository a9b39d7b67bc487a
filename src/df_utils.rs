use std::collections::HashSet;

use anyhow::Result;
use polars::prelude::*;

/// The two halves of a threshold split.
#[derive(Debug, Clone)]
pub struct Partition {
    pub significant: DataFrame,
    pub remainder: DataFrame,
    /// Rows whose p-value was missing or not a number; they sit in `remainder`.
    pub missing_p: usize,
}

pub fn p_values(df: &DataFrame, p_col: &str) -> Result<Float64Chunked> {
    let series = df
        .column(p_col)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

/// Rows with `p <= threshold` go to `significant`, every other row (including
/// rows with no usable p-value) to `remainder`. Row order is kept in both.
pub fn split_by_threshold(df: &DataFrame, p_col: &str, threshold: f64) -> Result<Partition> {
    let pvals = p_values(df, p_col)?;
    let mut missing_p = 0usize;
    let significant_mask: BooleanChunked = pvals
        .into_iter()
        .map(|p| match p {
            Some(v) if v.is_nan() => {
                missing_p += 1;
                false
            }
            Some(v) => v <= threshold,
            None => {
                missing_p += 1;
                false
            }
        })
        .collect();
    let remainder_mask = !&significant_mask;

    Ok(Partition {
        significant: df.filter(&significant_mask)?,
        remainder: df.filter(&remainder_mask)?,
        missing_p,
    })
}

pub fn marker_ids(df: &DataFrame, snp_col: &str) -> Result<Vec<String>> {
    let series = df
        .column(snp_col)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect())
}

/// Keeps rows whose marker is in `ids` (`keep = true`) or not in `ids`
/// (`keep = false`). Returns the filtered frame and the number of dropped rows.
pub fn filter_markers(
    df: &DataFrame,
    snp_col: &str,
    ids: &HashSet<String>,
    keep: bool,
) -> Result<(DataFrame, usize)> {
    let series = df
        .column(snp_col)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let mask: BooleanChunked = series
        .str()?
        .into_iter()
        .map(|id| match id {
            Some(id) => ids.contains(id) == keep,
            None => !keep,
        })
        .collect();
    let before = df.height();
    let out = df.filter(&mask)?;
    let removed = before.saturating_sub(out.height());
    Ok((out, removed))
}

/// C `%g`: six significant digits, trailing zeros dropped, scientific
/// notation when the exponent is below -4 or at least 6.
pub fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{value:.5e}");
    let (mantissa, exp) = sci.split_once('e').expect("exponent in {:e} output");
    let exp: i32 = exp.parse().expect("integer exponent in {:e} output");

    if !(-4..6).contains(&exp) {
        let mantissa = strip_trailing_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (5 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn is_float_token(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

fn looks_fractional(token: &str) -> bool {
    token.parse::<i64>().is_err()
}

/// Rewrites float-valued columns as `%g` strings. String columns read without
/// type inference count as float-valued when every value parses as a number
/// and at least one is not an integer literal.
pub fn format_float_columns(mut df: DataFrame) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        let series = df.column(&name)?.as_materialized_series().clone();
        let formatted: Option<Vec<Option<String>>> = match series.dtype() {
            DataType::Float64 | DataType::Float32 => {
                let casted = series.cast(&DataType::Float64)?;
                Some(
                    casted
                        .f64()?
                        .into_iter()
                        .map(|v| v.map(format_general))
                        .collect(),
                )
            }
            DataType::String => {
                let ca = series.str()?;
                let mut any_value = false;
                let mut any_fraction = false;
                let mut all_numeric = true;
                for token in ca.into_iter().flatten() {
                    any_value = true;
                    if !is_float_token(token) {
                        all_numeric = false;
                        break;
                    }
                    any_fraction |= looks_fractional(token);
                }
                if any_value && all_numeric && any_fraction {
                    Some(
                        ca.into_iter()
                            .map(|v| {
                                v.and_then(|s| s.parse::<f64>().ok())
                                    .map(format_general)
                            })
                            .collect(),
                    )
                } else {
                    None
                }
            }
            _ => None,
        };
        if let Some(values) = formatted {
            let s = Series::new(name.as_str().into(), values);
            df.with_column(s)?;
        }
    }
    Ok(df)
}

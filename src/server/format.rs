use crate::chain::{strike_decimals, ChainRow};

/// Row tag for table highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowHighlight {
    ItmCall,
    ItmPut,
    Atm,
}

impl RowHighlight {
    pub fn of(row: &ChainRow) -> Self {
        if row.is_atm() {
            Self::Atm
        } else if row.is_call_itm {
            Self::ItmCall
        } else {
            Self::ItmPut
        }
    }
}

/// Display strings for one chain row. Values in the raw row are untouched.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DisplayRow {
    pub strike: String,
    pub call_price: String,
    pub put_price: String,
    pub call_prob_itm: String,
    pub put_prob_itm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch_probability: Option<String>,
    pub highlight: RowHighlight,
}

impl DisplayRow {
    pub fn new(row: &ChainRow, spot: f64) -> Self {
        Self {
            strike: format_currency(row.strike, spot),
            call_price: format_currency(row.call_price, spot),
            put_price: format_currency(row.put_price, spot),
            call_prob_itm: format_percent(row.call_prob_itm),
            put_prob_itm: format_percent(row.put_prob_itm),
            touch_probability: row.touch_probability.map(format_percent),
            highlight: RowHighlight::of(row),
        }
    }
}

/// `$1,234.56`, or `$0.5123` when the spot is under 10.
pub fn format_currency(value: f64, spot: f64) -> String {
    let decimals = strike_decimals(spot) as usize;
    let s = separate_with_commas(&format!("{:.*}", decimals, value.abs()));
    if value < 0.0 {
        format!("-${s}")
    } else {
        format!("${s}")
    }
}

#[inline]
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn separate_with_commas(s: &str) -> String {
    let (int_part, dec_part) = match s.find('.') {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    };

    let mut out = String::with_capacity(s.len() + int_part.len() / 3);
    let len = int_part.len();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.push_str(dec_part);
    out
}

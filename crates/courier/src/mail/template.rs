//! Passcode email body.

/// Content of the email carrying a passcode
#[derive(Debug, Clone)]
pub struct OtpEmail<'a> {
    pub brand: &'a str,
    pub code: &'a str,
    pub valid_minutes: i64,
}

impl<'a> OtpEmail<'a> {
    pub fn new(brand: &'a str, code: &'a str, valid_minutes: i64) -> Self {
        Self {
            brand,
            code,
            valid_minutes,
        }
    }

    /// Render the HTML body
    pub fn html(&self) -> String {
        let minutes = if self.valid_minutes == 1 { "minute" } else { "minutes" };

        format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: auto;">
  <h2>{brand} - One-Time Passcode</h2>
  <p>Your passcode is:</p>
  <div style="font-size: 32px; font-weight: bold; letter-spacing: 4px; margin: 16px 0;">{code}</div>
  <p>This passcode is valid for {valid} {minutes}. If you did not request it, you can ignore this email.</p>
</div>"#,
            brand = escape_html(self.brand),
            code = escape_html(self.code),
            valid = self.valid_minutes,
            minutes = minutes,
        )
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

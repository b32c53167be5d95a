//! Generated cover pages.
//!
//! When the dashboard has no cover component of its own, [`cover_html`] is
//! mounted in the page and rasterized like any other snapshot. [`CoverText`]
//! is the last resort, typeset directly by the emitters.

use super::{ReportMeta, ReportType};
use chrono::Datelike;
use quick_xml::escape::escape;

const BRAND: &str = "#09423c";
const ACCENT: &str = "#4f9690";
const MUTED: &str = "#6b8a87";
const TINT: &str = "#e8f3f2";

fn icon_paths(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::Cro => {
            r#"<path d="M12 22s8-4 8-10V5l-8-3-8 3v7c0 6 8 10 8 10z"></path><path d="m9 12 2 2 4-4"></path>"#
        }
        ReportType::Ciso => {
            r#"<path d="M12 22s8-4 8-10V5l-8-3-8 3v7c0 6 8 10 8 10z"></path><path d="M12 8v4"></path><path d="M12 16h.01"></path>"#
        }
        ReportType::Board => r#"<polyline points="22 12 18 12 15 21 9 3 6 12 2 12"></polyline>"#,
    }
}

/// Letter-sized (816x1056 CSS px) cover markup with inline styles only.
pub fn cover_html(meta: &ReportMeta) -> String {
    let rt = meta.report_type;
    let org = escape(meta.organization.as_str());
    let year = chrono::Local::now().year();
    format!(
        r#"<div style="width: 816px; height: 1056px; box-sizing: border-box; border: 1px solid {tint}; background: #ffffff; display: flex; flex-direction: column; align-items: center; justify-content: center; padding: 48px; position: relative; overflow: hidden; font-family: Helvetica, Arial, sans-serif;">
  <div style="position: absolute; top: 48px; left: 48px; display: flex; align-items: center; gap: 12px;">
    <div style="width: 48px; height: 48px; background: {brand}; border-radius: 12px; display: flex; align-items: center; justify-content: center;">
      <svg width="28" height="28" style="color: #ffffff;" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path d="M21 16V8a2 2 0 0 0-1-1.73l-7-4a2 2 0 0 0-2 0l-7 4A2 2 0 0 0 3 8v8a2 2 0 0 0 1 1.73l7 4a2 2 0 0 0 2 0l7-4A2 2 0 0 0 21 16z"></path></svg>
    </div>
    <div>
      <h3 style="margin: 0; font-size: 14px; font-weight: 900; color: {brand};">MOKSHYA</h3>
      <p style="margin: 0; font-size: 10px; font-weight: 700; color: {accent}; text-transform: uppercase; letter-spacing: 0.1em;">Risk OS</p>
    </div>
  </div>
  <div style="text-align: center; max-width: 672px;">
    <div style="width: 96px; height: 96px; background: {tint}; border-radius: 24px; display: flex; align-items: center; justify-content: center; margin: 0 auto 32px;">
      <svg width="56" height="56" style="color: {brand};" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2">{icon}</svg>
    </div>
    <div style="display: inline-block; padding: 8px 16px; background: {brand}; color: #ffffff; border-radius: 9999px; margin-bottom: 24px; font-size: 11px; font-weight: 900; text-transform: uppercase; letter-spacing: 0.1em;">{label} Report</div>
    <h1 style="font-size: 42px; font-weight: 900; color: {brand}; margin: 0 0 16px; line-height: 1.2;">{title}</h1>
    <p style="font-size: 18px; color: {accent}; margin: 0 0 48px; line-height: 1.6; font-weight: 500;">{subtitle}</p>
    <div style="background: #f8fbfb; border: 1px solid {tint}; border-radius: 16px; padding: 32px; margin-bottom: 32px;">
      <p style="margin: 0 0 8px; font-size: 11px; font-weight: 700; color: {accent}; text-transform: uppercase; letter-spacing: 0.1em;">Organization</p>
      <p style="margin: 0 0 16px; font-size: 20px; font-weight: 900; color: {brand};">{org}</p>
      <div style="height: 1px; background: {tint}; margin: 16px 0;"></div>
      <p style="margin: 0 0 8px; font-size: 11px; font-weight: 700; color: {accent}; text-transform: uppercase; letter-spacing: 0.1em;">Report Generated</p>
      <p style="margin: 0; font-size: 16px; font-weight: 700; color: {brand};">{date}</p>
    </div>
    <div style="color: {muted}; font-size: 11px; font-weight: 700; text-transform: uppercase; letter-spacing: 0.05em;">Confidential &amp; Proprietary</div>
  </div>
  <div style="position: absolute; bottom: 48px; left: 48px; right: 48px; display: flex; justify-content: space-between; font-size: 10px; color: #94a3b8; font-weight: 500;">
    <span>&#169; {year} Mokshya Risk OS</span>
    <span>Generated: {date}</span>
  </div>
</div>"#,
        tint = TINT,
        brand = BRAND,
        accent = ACCENT,
        muted = MUTED,
        icon = icon_paths(rt),
        label = rt.label(),
        title = escape(rt.title()),
        subtitle = escape(rt.subtitle()),
        org = org,
        date = meta.display_date(),
        year = year,
    )
}

/// Text lines of a typeset cover, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverText {
    pub badge: String,
    pub title: String,
    pub subtitle: String,
    pub organization: String,
    pub generated: String,
    pub notice: String,
    pub footer: String,
}

impl CoverText {
    pub fn new(meta: &ReportMeta) -> Self {
        let rt = meta.report_type;
        Self {
            badge: format!("{} Report", rt.label()),
            title: rt.title().to_string(),
            subtitle: rt.subtitle().to_string(),
            organization: meta.organization.clone(),
            generated: meta.display_date(),
            notice: "Confidential & Proprietary".to_string(),
            footer: format!("\u{a9} {} Mokshya Risk OS", chrono::Local::now().year()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn meta(org: &str) -> ReportMeta {
        ReportMeta::new(ReportType::Ciso, org).with_date(NaiveDate::from_ymd_opt(2024, 11, 30).unwrap())
    }

    #[test]
    fn cover_html_carries_report_identity() {
        let html = cover_html(&meta("Acme"));
        assert!(html.contains("CISO Report"));
        assert!(html.contains("Chief Information Security Officer Report"));
        assert!(html.contains("Security Posture &amp; Control Maturity Assessment"));
        assert!(html.contains("November 30, 2024"));
        assert!(html.contains("width: 816px; height: 1056px"));
    }

    #[test]
    fn organization_is_escaped() {
        let html = cover_html(&meta("<script>x</script>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn typeset_lines() {
        let text = CoverText::new(&meta("Acme"));
        assert_eq!(text.badge, "CISO Report");
        assert_eq!(text.organization, "Acme");
        assert_eq!(text.generated, "November 30, 2024");
        assert!(text.footer.ends_with("Mokshya Risk OS"));
    }
}

use common::model::template::Geometry;

/// Base stylesheet. Colors must already be normalized; they are emitted unescaped.
pub(super) fn base_css(geometry: Geometry, title_color: &str, body_color: &str, overlay_color: &str) -> String {
    format!(
        r#"* {{ box-sizing: border-box; margin: 0; padding: 0; }}
body {{ background: #ffffff; font-family: Georgia, "Times New Roman", serif; }}
.certificate {{
  position: relative;
  width: {width}px;
  height: {height}px;
  aspect-ratio: {width} / {height};
  overflow: hidden;
  background-color: #ffffff;
  background-size: cover;
  background-position: center;
}}
.certificate__overlay {{ position: absolute; inset: 0; background: {overlay}; pointer-events: none; }}
.certificate__content {{
  position: relative;
  height: 100%;
  display: flex;
  flex-direction: column;
  align-items: center;
  justify-content: center;
  gap: 14px;
  padding: 48px 64px;
  text-align: center;
  color: {body};
}}
.certificate__logo {{ object-fit: contain; }}
.certificate__title {{ color: {title}; font-size: 44px; letter-spacing: 1px; }}
.certificate__body {{ font-size: 18px; line-height: 1.5; }}
.certificate__recipient {{ color: {title}; font-size: 36px; font-style: italic; }}
.certificate__course {{ font-size: 24px; }}
.certificate__date {{ font-size: 14px; }}
.certificate__signatures {{ display: flex; gap: 48px; justify-content: center; margin-top: 24px; }}
.signature {{ display: flex; flex-direction: column; align-items: center; min-width: 180px; }}
.signature__image {{ max-height: 60px; max-width: 180px; object-fit: contain; }}
.signature__line {{ width: 100%; border-top: 1px solid {body}; margin: 4px 0; }}
.signature__name {{ font-size: 15px; font-weight: bold; }}
.signature__role {{ font-size: 13px; }}
"#,
        width = geometry.width,
        height = geometry.height,
        overlay = overlay_color,
        body = body_color,
        title = title_color,
    )
}

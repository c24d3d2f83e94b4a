//! 预览文档：把抽取结果渲染成一个小型 HTML 页面

use crate::model::extractor::StringUnit;

/// 每个单元一个 `<p>`，`id` 为抽取序号，`data-identifier` 为地址
pub fn render_preview(units: &[StringUnit]) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n<body>\n");
    for (n, unit) in units.iter().enumerate() {
        let text = html_escape::encode_text(&unit.text).replace('\n', "<br>");
        html.push_str(&format!(
            "<p id=\"unit-{}\" data-identifier=\"{}\">{}</p>\n",
            n,
            html_escape::encode_double_quoted_attribute(&unit.identifier),
            text
        ));
    }
    html.push_str("</body>\n</html>\n");
    html
}

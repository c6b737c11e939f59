///! Member list page

use idcard_backend::CardController;
use idcard_backend::module::card::escape_xml;

pub const NO_SELECTION_TEXT: &str = "メンバーを選択してください";

const PAGE_STYLE: &str = r#"
body { margin: 0; font-family: sans-serif; background: #f3f4f6; }
main { display: flex; gap: 2rem; max-width: 72rem; margin: 0 auto; padding: 2rem; height: calc(100vh - 4rem); }
.list { width: 33%; background: #fff; border-radius: 8px; box-shadow: 0 4px 12px rgba(0,0,0,.1); display: flex; flex-direction: column; overflow: hidden; }
.list h1 { margin: 0; padding: 1rem; background: #EBC700; color: #fff; font-size: 1.25rem; }
.list ul { list-style: none; margin: 0; padding: .5rem; overflow-y: auto; flex: 1; }
.list button { width: 100%; display: flex; justify-content: space-between; padding: .75rem 1rem; border: 0; border-bottom: 1px solid #f3f4f6; background: none; cursor: pointer; text-align: left; }
.list li.selected button { background: #fefce8; color: #854d0e; font-weight: bold; border-left: 4px solid #EBC700; }
.cohort { font-size: .75rem; color: #9ca3af; background: #f3f4f6; padding: .1rem .5rem; border-radius: 999px; }
.viewer { width: 67%; display: flex; flex-direction: column; align-items: center; justify-content: center; gap: 1.5rem; background: #f9fafb; border-radius: 8px; }
.viewer .empty { color: #9ca3af; font-size: 1.125rem; }
.actions { display: flex; gap: 1rem; align-items: center; }
.actions button { padding: .5rem 1.25rem; border: 0; border-radius: 6px; background: #EBC700; color: #fff; font-weight: bold; cursor: pointer; }
.actions button:disabled { background: #d1d5db; cursor: not-allowed; }
"#;

/// Polls the export status while a download form is in flight.
const PAGE_SCRIPT: &str = r#"
const busy = document.getElementById('busy');
async function poll() {
  const res = await fetch('/api/status');
  const s = await res.json();
  if (s.export.busy) {
    busy.textContent = `保存中… (${s.export.done}/${s.export.total})`;
    setTimeout(poll, 300);
  } else {
    busy.textContent = s.export.last_error ? s.export.last_error : '';
    document.querySelectorAll('.actions button').forEach(b => b.disabled = !s.exports_enabled);
  }
}
document.querySelectorAll('.actions form').forEach(f => f.addEventListener('submit', () => {
  document.querySelectorAll('.actions button').forEach(b => b.disabled = true);
  setTimeout(poll, 100);
}));
"#;

pub fn render_index(controller: &CardController) -> String {
    let selected = controller.selected_index();

    let mut items = String::new();
    for (index, member) in controller.members().iter().enumerate() {
        let class = if selected == Some(index) { " class=\"selected\"" } else { "" };
        items.push_str(&format!(
            r#"<li{}><form method="post" action="/select/{}"><button type="submit"><span>{}</span><span class="cohort">{}</span></button></form></li>
"#,
            class,
            index,
            escape_xml(&member.display_name),
            escape_xml(&member.cohort)
        ));
    }

    let card = match controller.render_selected() {
        Some(view) => view.svg,
        None => format!(r#"<div class="empty">{}</div>"#, NO_SELECTION_TEXT),
    };

    let disabled = if controller.exports_enabled() && !controller.export_status().busy {
        ""
    } else {
        " disabled"
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<main>
<section class="list">
<h1>メンバー一覧</h1>
<ul>
{items}</ul>
</section>
<section class="viewer">
{card}
<div class="actions">
<form method="post" action="/export/current"><button type="submit"{disabled}>この学生証を保存</button></form>
<form method="post" action="/export/all"><button type="submit"{disabled}>全員分を保存</button></form>
<span id="busy"></span>
</div>
</section>
</main>
<script>{script}</script>
</body>
</html>
"#,
        title = escape_xml(&controller.renderer().title()),
        style = PAGE_STYLE,
        items = items,
        card = card,
        disabled = disabled,
        script = PAGE_SCRIPT,
    )
}

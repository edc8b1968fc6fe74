//! Server-side HTML: the page shell and the fragments htmx swaps in.

use indoc::formatdoc;

use tubecore::scanner::{VideoRecord, VideoStatus};
use tubecore::subscriptions::DownloadRun;
use tubecore::SubscriptionView;

/// A one-line message shown above the subscription list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

const STYLE: &str = r#"
*{box-sizing:border-box}
body{margin:0;background:#111;color:#e8e8e8;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif}
main{max-width:960px;margin:0 auto;padding:24px}
h1{font-size:1.5rem;margin:0 0 16px}
form.row{display:flex;gap:8px;margin-bottom:12px}
input[type=text]{flex:1;padding:8px 10px;border-radius:6px;border:1px solid #333;background:#1b1b1b;color:inherit}
button{padding:8px 14px;border-radius:6px;border:0;background:#2d6cdf;color:#fff;cursor:pointer}
button.secondary{background:#333}
button.danger{background:#b33}
.notice{padding:8px 12px;border-radius:6px;margin-bottom:12px}
.notice.info{background:#1d3557}
.notice.warning{background:#5c4400}
.notice.error{background:#5c1a1a}
.card{display:flex;gap:16px;padding:12px;border:1px solid #2a2a2a;border-radius:10px;margin-bottom:12px;background:#181818}
.poster{width:72px;height:72px;border-radius:50%;object-fit:cover;background:#2a2a2a;flex-shrink:0}
.meta{flex:1;min-width:0}
.meta h2{font-size:1.05rem;margin:0 0 4px}
.url{color:#888;font-size:.8rem;word-break:break-all}
.kind{font-size:.7rem;text-transform:uppercase;padding:2px 6px;border-radius:4px;background:#333;margin-left:6px}
.stats{font-size:.85rem;color:#bbb;margin:6px 0}
.run.ok{color:#6c6}
.run.failed{color:#e66}
.actions{display:flex;gap:6px;flex-wrap:wrap}
table.videos{width:100%;border-collapse:collapse;font-size:.82rem;margin-top:8px}
table.videos td{padding:4px 6px;border-top:1px solid #2a2a2a}
.status{padding:1px 6px;border-radius:4px}
.status.downloaded{background:#1f4d1f}
.status.pending{background:#333}
.status.partial{background:#5c4400}
.status.failed{background:#5c1a1a}
#toasts{position:fixed;right:16px;bottom:16px;display:flex;flex-direction:column;gap:6px;max-width:360px}
.toast{background:#222;border:1px solid #333;border-radius:6px;padding:8px 10px;font-size:.8rem}
.empty{color:#888}
"#;

/// Push client: shows event messages as toasts and reloads the list when a
/// subscription changes.
const PUSH_CLIENT: &str = r##"
(function () {
  const refreshOn = new Set([
    "subscription_enrichment:channel_ready",
    "subscription_enrichment:thumbnail_complete",
    "subscription_enrichment:complete",
    "subscription_enrichment:error",
    "video_discovery:complete",
    "download:finished",
  ]);

  function toast(text) {
    const box = document.getElementById("toasts");
    if (!box || !text) return;
    const el = document.createElement("div");
    el.className = "toast";
    el.textContent = text;
    box.appendChild(el);
    setTimeout(() => el.remove(), 5000);
    while (box.children.length > 5) box.firstChild.remove();
  }

  function connect(delay) {
    const proto = location.protocol === "https:" ? "wss://" : "ws://";
    const socket = new WebSocket(proto + location.host + "/ws");
    socket.onopen = () => { delay = 1000; };
    socket.onmessage = (msg) => {
      let event;
      try { event = JSON.parse(msg.data); } catch (_) { return; }
      const data = event.data || {};
      if (event.type !== "progress") toast(data.message);
      if (refreshOn.has(event.namespace + ":" + event.type)) {
        htmx.ajax("GET", "/subscriptions", { target: "#subscriptions", swap: "innerHTML" });
      }
    };
    socket.onclose = () => setTimeout(() => connect(Math.min(delay * 2, 30000)), delay);
  }

  connect(1000);
})();
"##;

/// Escape text for HTML element content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// URL-encodes a data-relative path segment by segment, keeping the `/`
/// separators so the static route still sees the directory layout.
fn encode_data_path(path: &str) -> String {
    path.split('/').map(urlencoding::encode).collect::<Vec<_>>().join("/")
}

pub fn notice(notice: &Notice) -> String {
    let (class, text) = match notice {
        Notice::Info(text) => ("info", text),
        Notice::Warning(text) => ("warning", text),
        Notice::Error(text) => ("error", text),
    };
    format!(r#"<div class="notice {}">{}</div>"#, class, html_escape(text))
}

/// The full page: forms, list container and the push client.
pub fn page(parameters: &str) -> String {
    formatdoc! {r##"
        <!DOCTYPE html>
        <html lang="en">
        <head>
        <meta charset="UTF-8">
        <meta name="viewport" content="width=device-width, initial-scale=1.0">
        <title>tubewatch</title>
        <script src="https://unpkg.com/htmx.org@1.9.12"></script>
        <style>{style}</style>
        </head>
        <body>
        <main>
        <h1>tubewatch</h1>
        <form class="row" hx-post="/add" hx-target="#subscriptions" hx-swap="innerHTML" hx-on::after-request="this.reset()">
          <input type="text" name="item" placeholder="Channel, playlist or video URL" required>
          <button type="submit">Subscribe</button>
        </form>
        <form class="row" hx-post="/set-parameters" hx-swap="none">
          <input type="text" name="parameters" value="{parameters}" placeholder="yt-dlp parameters">
          <button type="submit" class="secondary">Save parameters</button>
        </form>
        <div id="subscriptions" hx-get="/subscriptions" hx-trigger="load" hx-swap="innerHTML"></div>
        </main>
        <div id="toasts"></div>
        <script>{script}</script>
        </body>
        </html>
    "##,
        style = STYLE,
        parameters = html_escape(parameters),
        script = PUSH_CLIENT,
    }
}

fn last_run_line(run: Option<&DownloadRun>) -> String {
    match run {
        None => r#"<div class="run">Never downloaded</div>"#.to_string(),
        Some(run) if run.finished_at.is_none() => {
            format!(r#"<div class="run">Downloading since {}</div>"#, html_escape(&run.started_at))
        }
        Some(run) if run.success => format!(
            r#"<div class="run ok">Last run OK at {}</div>"#,
            html_escape(run.finished_at.as_deref().unwrap_or_default())
        ),
        Some(run) => {
            let reason = run
                .message
                .as_deref()
                .or(run.failure_kind.as_deref())
                .unwrap_or("unknown error");
            format!(
                r#"<div class="run failed">Last run failed at {}: {}</div>"#,
                html_escape(run.finished_at.as_deref().unwrap_or_default()),
                html_escape(reason)
            )
        }
    }
}

fn subscription_card(view: &SubscriptionView) -> String {
    let sub = &view.subscription;
    let encoded_url = urlencoding::encode(&sub.url);
    let channel_id = sub.channel_id.as_deref().unwrap_or("unknown");
    let videos_target = format!("videos-{}", sub.id);

    let poster = match view.poster_path.as_deref() {
        Some(path) => format!(
            r#"<img class="poster" src="/static/data/{}" alt="{}" loading="lazy">"#,
            html_escape(&encode_data_path(path)),
            html_escape(sub.display_name())
        ),
        None => r#"<div class="poster"></div>"#.to_string(),
    };

    let stats = &view.stats;
    formatdoc! {r##"
        <div class="card" id="subscription-{id}">
          {poster}
          <div class="meta">
            <h2>{name}<span class="kind">{kind}</span></h2>
            <div class="url">{url}</div>
            <div class="stats">{progress} downloaded, {pending} pending, {partial} partial, {failed} failed ({downloaded_size} of {expected_size})</div>
            {last_run}
            <div class="actions">
              <button hx-post="/update/{encoded_url}" hx-target="#subscriptions" hx-swap="innerHTML">Update now</button>
              <button class="secondary" hx-get="/videos/{channel_id}" hx-target="#{videos_target}" hx-swap="innerHTML">Videos</button>
              <button class="danger" hx-delete="/remove/{encoded_url}" hx-target="#subscriptions" hx-swap="innerHTML" hx-confirm="Remove this subscription?">Remove</button>
            </div>
            <div id="{videos_target}"></div>
          </div>
        </div>
    "##,
        id = sub.id,
        poster = poster,
        name = html_escape(sub.display_name()),
        kind = sub.kind,
        url = html_escape(&sub.url),
        progress = stats.progress(),
        pending = stats.pending,
        partial = stats.partial,
        failed = stats.failed,
        downloaded_size = stats.downloaded_size_human(),
        expected_size = stats.expected_size_human(),
        last_run = last_run_line(view.last_run.as_ref()),
        encoded_url = html_escape(&encoded_url),
        channel_id = html_escape(&urlencoding::encode(channel_id)),
        videos_target = videos_target,
    }
}

/// The subscription list fragment, newest first.
pub fn subscription_list(views: &[SubscriptionView], top: Option<&Notice>) -> String {
    let mut html = String::new();
    if let Some(top) = top {
        html.push_str(&notice(top));
    }

    if views.is_empty() {
        html.push_str(r#"<p class="empty">No subscriptions yet. Paste a URL above to start.</p>"#);
        return html;
    }

    for view in views {
        html.push_str(&subscription_card(view));
    }
    html
}

fn status_badge(status: VideoStatus) -> String {
    format!(r#"<span class="status {0}">{0}</span>"#, status)
}

/// The video list fragment of one channel.
pub fn video_list(records: &[VideoRecord]) -> String {
    if records.is_empty() {
        return r#"<p class="empty">No videos discovered yet.</p>"#.to_string();
    }

    let mut rows = String::new();
    for record in records {
        let size = match record.expected_size_human() {
            Some(expected) => format!("{} / {}", record.downloaded_size_human(), expected),
            None => record.downloaded_size_human(),
        };
        rows.push_str(&format!(
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="url">{}</td></tr>"#,
            html_escape(&record.title),
            status_badge(record.status),
            size,
            html_escape(record.filename.as_deref().unwrap_or(""))
        ));
    }
    format!(r#"<table class="videos">{}</table>"#, rows)
}

use crate::models::EntryView;
use crate::route::Route;
use crate::timer::{MEDITATION_PRESETS, REST_PRESETS};

pub fn render_index(date: &str, streak: u32, entries: &[EntryView]) -> String {
    let nav = Route::tabs()
        .iter()
        .map(|route| {
            format!(
                r#"<a class="tab" data-route="{route}" href="{href}">{title}</a>"#,
                href = route.href(),
                title = route.title(),
            )
        })
        .collect::<String>();

    INDEX_HTML
        .replace("{{NAV}}", &nav)
        .replace("{{DATE}}", &escape(date))
        .replace("{{STREAK}}", &streak_label(streak))
        .replace("{{ENTRIES}}", &entry_items(entries))
        .replace("{{MEDITATION_PRESETS}}", &meditation_buttons())
        .replace("{{REST_PRESETS}}", &rest_buttons())
}

fn meditation_buttons() -> String {
    MEDITATION_PRESETS
        .iter()
        .map(|minutes| {
            format!(r#"<button type="button" data-minutes="{minutes}">{minutes} min</button>"#)
        })
        .collect()
}

fn rest_buttons() -> String {
    REST_PRESETS
        .iter()
        .map(|seconds| {
            format!(r#"<button type="button" data-seconds="{seconds}">{seconds}s</button>"#)
        })
        .collect()
}

fn streak_label(days: u32) -> String {
    match days {
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    }
}

fn entry_items(entries: &[EntryView]) -> String {
    if entries.is_empty() {
        return r#"<li class="empty">Nothing logged yet today.</li>"#.to_string();
    }
    entries
        .iter()
        .map(|view| {
            let href = Route::Entry(view.entry.id.clone()).href();
            format!(
                r#"<li><a href="{href}"><strong>{title}</strong><span>{summary}</span></a></li>"#,
                href = escape(&href),
                title = escape(&view.title),
                summary = escape(&view.summary),
            )
        })
        .collect()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Repbook</title>
  <style>
    :root {
      --bg-1: #f8f3e6;
      --bg-2: #f5d3a7;
      --ink: #2b2a28;
      --accent: #d45113;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: start center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(720px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 32px;
      display: grid;
      gap: 24px;
    }

    h1 {
      font-family: "Georgia", serif;
      margin: 0;
    }

    .panel {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
      gap: 16px;
    }

    .stat {
      background: white;
      border-radius: 18px;
      padding: 16px;
      border: 1px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 6px;
    }

    .stat .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .stat .value {
      font-size: 1.5rem;
      font-weight: 600;
      color: var(--accent-2);
    }

    .tabs {
      display: flex;
      flex-wrap: wrap;
      gap: 6px;
      padding: 6px;
      background: rgba(47, 72, 88, 0.08);
      border-radius: 999px;
    }

    .tab {
      border-radius: 999px;
      padding: 8px 14px;
      font-weight: 600;
      color: #6b645d;
      text-decoration: none;
    }

    .tab.active {
      background: white;
      color: var(--accent-2);
    }

    ul.entries {
      list-style: none;
      margin: 0;
      padding: 0;
      display: grid;
      gap: 10px;
    }

    ul.entries a {
      display: grid;
      gap: 4px;
      background: white;
      border-radius: 16px;
      padding: 14px 16px;
      color: inherit;
      text-decoration: none;
    }

    ul.entries span {
      color: #6b645d;
    }

    .empty {
      color: #8b857d;
    }

    #chart {
      width: 100%;
      height: 220px;
      background: white;
      border-radius: 18px;
    }

    .chart-line {
      fill: none;
      stroke: var(--accent);
      stroke-width: 3;
    }

    .chart-label {
      fill: #7a746d;
      font-size: 11px;
    }

    .status {
      min-height: 1.2em;
      color: #6b645d;
    }

    .status[data-type="error"] {
      color: #c63b2b;
    }

    .status button {
      margin-left: 8px;
    }

    .presets {
      display: flex;
      flex-wrap: wrap;
      gap: 8px;
    }

    .presets button,
    #meditation-stop {
      border: none;
      border-radius: 999px;
      padding: 8px 14px;
      background: white;
      color: var(--accent-2);
      font-weight: 600;
      cursor: pointer;
    }

    .timer {
      font-size: 2rem;
      font-weight: 600;
      color: var(--accent);
      min-height: 1.2em;
    }

    .rest {
      display: flex;
      align-items: center;
      gap: 12px;
    }

    .rest .timer {
      font-size: 1.2rem;
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>Repbook</h1>
      <nav class="tabs">{{NAV}}</nav>
    </header>
    <section class="panel">
      <div class="stat">
        <span class="label">Today</span>
        <span id="date" class="value">{{DATE}}</span>
      </div>
      <div class="stat">
        <span class="label">Streak</span>
        <span id="streak" class="value">{{STREAK}}</span>
      </div>
    </section>
    <section id="view">
      <h2 id="view-title">Today</h2>
      <ul id="entries" class="entries">{{ENTRIES}}</ul>
      <svg id="chart" viewBox="0 0 600 220" role="img" aria-label="Weekly totals" hidden></svg>
      <div id="meditation" hidden>
        <div id="meditation-presets" class="presets">{{MEDITATION_PRESETS}}</div>
        <p id="meditation-state" class="timer"></p>
        <button type="button" id="meditation-stop" hidden>Cancel</button>
      </div>
    </section>
    <section class="rest">
      <span class="label">Rest</span>
      <div class="presets">{{REST_PRESETS}}</div>
      <span id="rest-state" class="timer"></span>
    </section>
    <div class="status" id="status"></div>
  </main>
  <script>
    const entriesEl = document.getElementById('entries');
    const titleEl = document.getElementById('view-title');
    const statusEl = document.getElementById('status');
    const chartEl = document.getElementById('chart');
    const streakEl = document.getElementById('streak');
    const meditationEl = document.getElementById('meditation');
    const meditationPresetsEl = document.getElementById('meditation-presets');
    const meditationStateEl = document.getElementById('meditation-state');
    const meditationStopEl = document.getElementById('meditation-stop');
    const restStateEl = document.getElementById('rest-state');

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const currentRoute = () => {
      const path = location.hash.replace(/^#\/?/, '').replace(/\/$/, '');
      return path.split('/')[0] || 'today';
    };

    const renderEntries = (views, emptyText) => {
      entriesEl.replaceChildren();
      if (!views.length) {
        const li = document.createElement('li');
        li.className = 'empty';
        li.textContent = emptyText;
        entriesEl.appendChild(li);
        return;
      }
      views.forEach((view) => {
        const li = document.createElement('li');
        const link = document.createElement('a');
        link.href = `#/entry/${view.entry.id}`;
        const title = document.createElement('strong');
        title.textContent = `${view.title} · ${view.displayDate}`;
        const summary = document.createElement('span');
        summary.textContent = view.summary;
        const remove = document.createElement('button');
        remove.type = 'button';
        remove.textContent = 'Delete';
        remove.addEventListener('click', (event) => {
          event.preventDefault();
          deleteEntry(view.entry.id);
        });
        link.append(title, summary, remove);
        li.appendChild(link);
        entriesEl.appendChild(li);
      });
    };

    const renderChart = (weekly) => {
      const series = weekly.series[0];
      if (!series) {
        chartEl.hidden = true;
        return;
      }
      const width = 600;
      const height = 220;
      const pad = 36;
      const max = Math.max(1, ...series.data);
      const step = (width - pad * 2) / Math.max(1, series.data.length - 1);
      const x = (i) => pad + i * step;
      const y = (v) => height - pad - (v / max) * (height - pad * 2);
      const path = series.data.map((v, i) => `${i === 0 ? 'M' : 'L'} ${x(i)} ${y(v)}`).join(' ');
      const labels = weekly.labels
        .map((label, i) =>
          `<text class="chart-label" x="${x(i)}" y="${height - 10}" text-anchor="middle">` +
          `${label.slice(5)}</text>`)
        .join('');
      chartEl.innerHTML = `<path class="chart-line" d="${path}" />${labels}`;
      chartEl.hidden = false;
    };

    const load = async (url) => {
      const res = await fetch(url);
      if (!res.ok) {
        throw new Error(await res.text());
      }
      return res.json();
    };

    const send = async (url, method, body) => {
      const options = { method };
      if (body) {
        options.headers = { 'Content-Type': 'application/json' };
        options.body = JSON.stringify(body);
      }
      const res = await fetch(url, options);
      if (!res.ok) {
        throw new Error(await res.text());
      }
      return res.status === 204 ? null : res.json();
    };

    const clock = (secs) => `${Math.floor(secs / 60)}:${String(secs % 60).padStart(2, '0')}`;

    const showRest = (rest) => {
      if (rest.state === 'counting') {
        restStateEl.textContent = clock(rest.remaining);
      } else {
        restStateEl.textContent = rest.state === 'finished' ? 'Go!' : '';
      }
    };

    const showMeditation = (timer) => {
      meditationPresetsEl.hidden = timer.state !== 'setup';
      meditationStopEl.hidden = timer.state === 'setup';
      if (timer.state === 'running') {
        meditationStateEl.textContent = clock(timer.remaining);
        meditationStopEl.textContent = 'Cancel';
      } else if (timer.state === 'complete') {
        meditationStateEl.textContent = `Logged ${timer.minutes} min.`;
        meditationStopEl.textContent = 'Done';
      } else {
        meditationStateEl.textContent = '';
      }
    };

    const pollTimers = async () => {
      try {
        showRest(await load('/api/rest'));
        if (currentRoute() !== 'meditation') {
          return;
        }
        let timer = await load('/api/meditation/timer');
        if (timer.state === 'running' && timer.remaining === 0) {
          await send('/api/meditation/timer/complete', 'POST');
          timer = await load('/api/meditation/timer');
        }
        showMeditation(timer);
      } catch (err) {
        setStatus(err.message, 'error');
      }
    };

    const showTimerView = async () => {
      titleEl.textContent = 'Meditation';
      entriesEl.hidden = true;
      chartEl.hidden = true;
      meditationEl.hidden = false;
      showMeditation(await load('/api/meditation/timer'));
    };

    document.querySelectorAll('[data-seconds]').forEach((button) => {
      button.addEventListener('click', async () => {
        try {
          showRest(await send('/api/rest', 'POST', { seconds: Number(button.dataset.seconds) }));
        } catch (err) {
          setStatus(err.message, 'error');
        }
      });
    });

    document.querySelectorAll('[data-minutes]').forEach((button) => {
      button.addEventListener('click', async () => {
        try {
          const minutes = Number(button.dataset.minutes);
          showMeditation(await send('/api/meditation/timer', 'POST', { minutes }));
        } catch (err) {
          setStatus(err.message, 'error');
        }
      });
    });

    meditationStopEl.addEventListener('click', async () => {
      try {
        showMeditation(await send('/api/meditation/timer', 'DELETE'));
      } catch (err) {
        setStatus(err.message, 'error');
      }
    });

    const showToday = async () => {
      const today = await load('/api/today');
      titleEl.textContent = 'Today';
      streakEl.textContent = today.streak === 1 ? '1 day' : `${today.streak} days`;
      renderEntries(today.entries, 'Nothing logged yet today.');
      chartEl.hidden = true;
    };

    const showHistory = async () => {
      const [history, weekly] = await Promise.all([
        load('/api/history'),
        load('/api/stats/weekly?weeks=8')
      ]);
      titleEl.textContent = 'History';
      renderEntries(history.recent, 'No entries yet.');
      renderChart(weekly);
    };

    const offerUndo = (message, token) => {
      setStatus(message, 'ok');
      const button = document.createElement('button');
      button.type = 'button';
      button.textContent = 'Undo';
      button.addEventListener('click', async () => {
        const res = await fetch(`/api/undo/${token}`, { method: 'POST' });
        setStatus(res.ok ? 'Restored.' : 'Undo window has passed.', res.ok ? 'ok' : 'error');
        render();
      });
      statusEl.appendChild(button);
    };

    const deleteEntry = async (id) => {
      const res = await fetch(`/api/entries/${id}`, { method: 'DELETE' });
      if (!res.ok) {
        setStatus(await res.text(), 'error');
        return;
      }
      const body = await res.json();
      offerUndo('Entry deleted.', body.undoToken);
      render();
    };

    const render = async () => {
      const route = currentRoute();
      document.querySelectorAll('.tab').forEach((tab) => {
        tab.classList.toggle('active', tab.dataset.route === route);
      });
      entriesEl.hidden = false;
      meditationEl.hidden = true;
      try {
        if (route === 'history') {
          await showHistory();
        } else if (route === 'meditation') {
          await showTimerView();
        } else {
          await showToday();
        }
      } catch (err) {
        setStatus(err.message, 'error');
      }
    };

    window.addEventListener('hashchange', render);
    setInterval(pollTimers, 1000);
    render();
    pollTimers();
  </script>
</body>
</html>
"#;

// src/handlers/ui.rs
use axum::routing::get;
use axum::Router;

pub fn ui_routes() -> Router {
    Router::new().route("/", get(chat_page))
}

pub async fn chat_page() -> axum::response::Html<&'static str> {
    let html = r###"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>SheetChat - Spreadsheet Analysis</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 860px; margin: 0 auto; padding: 20px; background: #f5f6fa; }
        header { display: flex; align-items: center; gap: 12px; padding-bottom: 12px; border-bottom: 1px solid #ddd; }
        header h1 { font-size: 1.3rem; margin: 0; }
        header p { margin: 0; color: #6c757d; font-size: 0.8rem; }
        #messages { min-height: 320px; max-height: 60vh; overflow-y: auto; padding: 16px 0; display: flex; flex-direction: column; gap: 10px; }
        .msg { max-width: 80%; padding: 10px 14px; border-radius: 14px; white-space: pre-wrap; line-height: 1.45; }
        .msg.user { align-self: flex-end; background: #4c6ef5; color: white; }
        .msg.assistant { align-self: flex-start; background: white; border: 1px solid #e3e3e3; }
        #typing { display: none; align-self: flex-start; color: #868e96; padding: 4px 14px; }
        #typing.on { display: block; }
        .upload-area { border: 1px dashed #bbb; border-radius: 10px; padding: 10px; text-align: center; cursor: pointer; background: white; margin-bottom: 8px; }
        .dataset { display: flex; justify-content: space-between; align-items: center; background: white; border: 1px solid #e3e3e3; border-radius: 8px; padding: 6px 10px; margin-bottom: 4px; font-size: 0.85rem; }
        .dataset button { border: none; background: none; color: #c92a2a; cursor: pointer; }
        #composer { display: flex; gap: 8px; margin-top: 8px; }
        #input { flex: 1; min-height: 52px; border-radius: 12px; border: 1px solid #ccc; padding: 10px; resize: none; }
        #send { width: 70px; border: none; border-radius: 12px; background: #4c6ef5; color: white; cursor: pointer; }
        #send:disabled { opacity: 0.5; cursor: default; }
        #notice { color: #c92a2a; font-size: 0.85rem; min-height: 1.2em; }
    </style>
</head>
<body>
    <header>
        <div>
            <h1>📊 SheetChat</h1>
            <p id="dataset-count">0 spreadsheets loaded</p>
        </div>
    </header>

    <div id="messages">
        <div class="msg assistant">Hello! Upload a spreadsheet (CSV, XLS or XLSX) and ask me to analyze it for you.</div>
    </div>
    <div id="typing">…</div>
    <div id="notice"></div>

    <div class="upload-area" id="uploadArea">
        <input type="file" id="fileInput" accept=".csv,.xlsx,.xls" multiple style="display:none">
        <span>📁 Upload spreadsheets (.csv, .xls, .xlsx)</span>
    </div>
    <div id="datasets"></div>

    <div id="composer">
        <textarea id="input" placeholder="Type your message..."></textarea>
        <button id="send">Send</button>
    </div>

    <script>
        let sessionId = null;
        let datasets = [];
        let sending = false;

        const messagesEl = document.getElementById('messages');
        const typingEl = document.getElementById('typing');
        const noticeEl = document.getElementById('notice');
        const inputEl = document.getElementById('input');
        const sendEl = document.getElementById('send');
        const fileInput = document.getElementById('fileInput');

        document.getElementById('uploadArea').addEventListener('click', () => fileInput.click());
        fileInput.addEventListener('change', (e) => uploadFiles(e.target.files));
        sendEl.addEventListener('click', sendMessage);
        inputEl.addEventListener('keydown', (e) => {
            if (e.key === 'Enter' && !e.shiftKey) { e.preventDefault(); sendMessage(); }
        });

        function addMessage(role, text) {
            const el = document.createElement('div');
            el.className = 'msg ' + role;
            el.textContent = text;
            messagesEl.appendChild(el);
            messagesEl.scrollTop = messagesEl.scrollHeight;
            return el;
        }

        function setTyping(on) {
            sending = on;
            typingEl.className = on ? 'on' : '';
            sendEl.disabled = on;
            inputEl.disabled = on;
        }

        function renderDatasets() {
            const list = document.getElementById('datasets');
            list.innerHTML = '';
            datasets.forEach((d, i) => {
                const row = document.createElement('div');
                row.className = 'dataset';
                const label = document.createElement('span');
                label.textContent = d.filename + ' (' + d.row_count + ' rows)';
                const remove = document.createElement('button');
                remove.textContent = '✕';
                remove.addEventListener('click', () => removeDataset(i));
                row.append(label, remove);
                list.appendChild(row);
            });
            document.getElementById('dataset-count').textContent =
                datasets.length + (datasets.length === 1 ? ' spreadsheet loaded' : ' spreadsheets loaded');
        }

        async function uploadFiles(files) {
            if (!files.length) return;
            const form = new FormData();
            for (const file of files) form.append('files', file);
            const url = sessionId ? '/api/upload?session=' + sessionId : '/api/upload';
            try {
                const resp = await fetch(url, { method: 'POST', body: form });
                const result = await resp.json();
                if (result.session_id) sessionId = result.session_id;
                (result.datasets || []).forEach(d => datasets.push(d));
                renderDatasets();
                noticeEl.textContent = (result.rejected || []).map(r => r.filename + ': ' + r.error).join('; ');
            } catch (err) {
                noticeEl.textContent = 'Upload failed: ' + err.message;
            }
            fileInput.value = '';
        }

        async function removeDataset(index) {
            if (!sessionId) return;
            const resp = await fetch('/api/sessions/' + sessionId + '/datasets/' + index, { method: 'DELETE' });
            const result = await resp.json();
            if (result.success) {
                datasets.splice(index, 1);
                renderDatasets();
                noticeEl.textContent = result.removed + ' removed';
            }
        }

        async function sendMessage() {
            const text = inputEl.value.trim();
            if (!text || sending) return;
            inputEl.value = '';
            noticeEl.textContent = '';
            addMessage('user', text);
            setTyping(true);

            let assistantEl = null;
            try {
                const resp = await fetch('/api/chat', {
                    method: 'POST',
                    headers: { 'Content-Type': 'application/json' },
                    body: JSON.stringify({ session_id: sessionId, message: text }),
                });
                if (!resp.ok) {
                    const result = await resp.json().catch(() => ({}));
                    noticeEl.textContent = result.error || 'Failed to start the analysis';
                    return;
                }

                const reader = resp.body.getReader();
                const decoder = new TextDecoder();
                let buffer = '';
                while (true) {
                    const { done, value } = await reader.read();
                    if (done) break;
                    buffer += decoder.decode(value, { stream: true });
                    let newline;
                    while ((newline = buffer.indexOf('\n')) !== -1) {
                        const line = buffer.slice(0, newline).replace(/\r$/, '');
                        buffer = buffer.slice(newline + 1);
                        if (!line.startsWith('data: ')) continue;
                        const event = JSON.parse(line.slice(6));
                        if (event.type === 'session') {
                            sessionId = event.session_id;
                        } else if (event.type === 'delta') {
                            if (!assistantEl) assistantEl = addMessage('assistant', '');
                            assistantEl.textContent += event.text;
                            messagesEl.scrollTop = messagesEl.scrollHeight;
                        } else if (event.type === 'error') {
                            noticeEl.textContent = event.notice;
                        }
                    }
                }
            } catch (err) {
                noticeEl.textContent = 'Error processing the message';
            } finally {
                setTyping(false);
            }
        }
    </script>
</body>
</html>
    "###;

    axum::response::Html(html)
}

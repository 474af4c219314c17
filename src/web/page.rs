//! The readings page.

use crate::sensors::ReadingSnapshot;

/// Status line and headers sent ahead of every page.
pub const RESPONSE_HEADER: &str =
    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n";

/// Render the HTML page for `snapshot`, reloading every `refresh_ms`.
pub fn render(snapshot: &ReadingSnapshot, refresh_ms: u64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>ESP32 Sensor Readings</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        body {{ font-family: Arial; text-align: center; }}
        h2 {{ color: #333; }}
        p {{ font-size: 1.2em; }}
    </style>
    <script>
        setInterval(function() {{
            location.reload();
        }}, {refresh_ms});
    </script>
</head>
<body>
    <h2>ESP32 Voltage and Current Sensor</h2>
    <p><strong>Voltage:</strong> {voltage:.2} V</p>
    <p><strong>Current:</strong> {current:.2} A</p>
</body>
</html>
"#,
        refresh_ms = refresh_ms,
        voltage = snapshot.voltage,
        current = snapshot.current,
    )
}

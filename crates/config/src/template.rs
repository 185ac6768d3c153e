//! Commented starter config written by `tunepress config init`.

/// Generate the default config template listening on `port`.
pub fn default_config_template(port: u16) -> String {
    format!(
        r##"# tunepress configuration
#
# Every key is optional; omitted keys keep their built-in defaults.
# Environment variable substitution is supported: ${{ENV_VAR}}

[server]
bind = "127.0.0.1"
port = {port}

[storage]
# data_dir = "/var/lib/tunepress"          # databases and published files
# downloads_dir = "/var/lib/tunepress/dl"  # default destination for containers
# database_url = "sqlite:///var/lib/tunepress/tunepress.db?mode=rwc"
job_store = "sqlite"                       # "sqlite" or "file"
retention_hours = 1                        # 0 keeps containers forever
retention_interval_secs = 3600

[acquisition]
max_attempts = 3
backoff_min_ms = 1000
backoff_max_ms = 3000
probe_timeout_secs = 30
search_timeout_secs = 30

[acquisition.ytdlp]
# binary = "/usr/local/bin/yt-dlp"
# ffmpeg_location = "/usr/bin"
# cookies_file = "/etc/tunepress/cookies.txt"
audio_codec = "mp3"
audio_quality = "192"

# Strategies are tried in order, cycling when max_attempts exceeds their count.
[[acquisition.strategies]]
name = "android"
client_profile = "android"
formats = ["bestaudio", "best"]
timeout_secs = 30

[acquisition.strategies.network]
geo_bypass = true
geo_bypass_country = "US"

[[acquisition.strategies]]
name = "web"
client_profile = "web"
user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0"
formats = ["bestaudio", "best"]
timeout_secs = 45

[acquisition.strategies.network]
geo_bypass = true
geo_bypass_country = "US"
force_ipv4 = true

[[acquisition.strategies]]
name = "mweb"
client_profile = "mweb"
user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
formats = ["bestaudio[ext=m4a]", "bestaudio", "best"]
timeout_secs = 60

[acquisition.strategies.network]
force_ipv4 = true

[thumbnail]
timeout_secs = 15
max_dimension = 1280

[publish]
provider = "filesystem"                    # "filesystem" or "cloudinary"
chunk_threshold_bytes = 10485760
chunk_size_bytes = 20971520
upload_timeout_secs = 600

[publish.filesystem]
# root = "/var/lib/tunepress/published"
# base_url = "https://media.example.com/tunepress"

[publish.cloudinary]
# cloud_name = "${{CLOUDINARY_CLOUD_NAME}}"
# api_key = "${{CLOUDINARY_API_KEY}}"
# api_secret = "${{CLOUDINARY_API_SECRET}}"
# folder = "tunepress"

[catalog]
collection = "recommendedSongs"
history_limit = 20

[queue]
enabled = true
poll_interval_secs = 300
cooldown_secs = 5
stuck_after_secs = 7200
"##
    )
}

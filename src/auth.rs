use keyring::Entry;
use log::{info, warn};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl, RefreshToken, Scope,
    TokenResponse, TokenUrl,
};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use url::Url;

type AuthResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const KEYRING_SERVICE: &str = "agenda-tui";
const KEYRING_USERNAME: &str = "microsoft_refresh_token";
const REDIRECT_ADDR: &str = "127.0.0.1:8080";
const REDIRECT_URL: &str = "http://localhost:8080";
const SCOPES: [&str; 3] = ["offline_access", "User.Read", "Calendars.Read"];

fn save_refresh_token(refresh_token: &str) -> Result<(), keyring::Error> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)?;
    entry.set_password(refresh_token)
}

fn load_refresh_token() -> Option<RefreshToken> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME).ok()?;
    entry.get_password().ok().map(RefreshToken::new)
}

fn delete_refresh_token() -> Result<(), keyring::Error> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USERNAME)?;
    entry.delete_password()
}

fn endpoint(tenant: &str, leaf: &str) -> String {
    format!("https://login.microsoftonline.com/{}/oauth2/v2.0/{}", tenant, leaf)
}

/// Pulls `code` out of the redirect's request line (`GET /?code=...&state=... HTTP/1.1`).
fn extract_code(request_line: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://localhost{}", path)).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
}

fn client(client_id: String, tenant: &str) -> AuthResult<BasicClient> {
    let auth_url = AuthUrl::new(endpoint(tenant, "authorize"))?;
    let token_url = Some(TokenUrl::new(endpoint(tenant, "token"))?);
    let redirect_url = RedirectUrl::new(REDIRECT_URL.to_string())?;
    Ok(BasicClient::new(ClientId::new(client_id), None, auth_url, token_url).set_redirect_uri(redirect_url))
}

/// Returns a Graph access token, refreshing from the keyring when possible and
/// falling back to the interactive PKCE login.
pub async fn authenticate(client_id: String, tenant: &str) -> AuthResult<String> {
    let client = client(client_id, tenant)?;

    if let Some(saved_refresh_token) = load_refresh_token() {
        info!("Attempting to refresh access token from system keyring...");
        match client
            .exchange_refresh_token(&saved_refresh_token)
            .request_async(async_http_client)
            .await
        {
            Ok(refreshed) => {
                info!("Token refreshed successfully!");
                if let Some(new_refresh_token) = refreshed.refresh_token() {
                    save_refresh_token(new_refresh_token.secret())?;
                }
                return Ok(refreshed.access_token().secret().clone());
            }
            Err(e) => {
                warn!("Could not refresh token ({}). Starting full login...", e);
                let _ = delete_refresh_token();
            }
        }
    }

    interactive_login(&client).await
}

/// Runs the browser login even when a refresh token is stored, replacing it.
pub async fn login(client_id: String, tenant: &str) -> AuthResult<()> {
    let client = client(client_id, tenant)?;
    interactive_login(&client).await?;
    Ok(())
}

/// Forgets the stored refresh token. `false` when none was stored.
pub fn logout() -> Result<bool, keyring::Error> {
    match delete_refresh_token() {
        Ok(()) => Ok(true),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(e) => Err(e),
    }
}

async fn interactive_login(client: &BasicClient) -> AuthResult<String> {
    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let mut request = client.authorize_url(CsrfToken::new_random);
    for scope in SCOPES {
        request = request.add_scope(Scope::new(scope.to_string()));
    }
    let (authorize_url, _csrf_state) = request.set_pkce_challenge(pkce_challenge).url();

    info!("Open this URL in your browser to log in: {}", authorize_url);
    println!("To continue, please open your browser and log in...");
    webbrowser::open(authorize_url.as_str())?;

    let code = tokio::task::spawn_blocking(wait_for_redirect).await??;
    let Some(code) = code else {
        return Err("Authentication failed: no authorization code received".into());
    };

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(async_http_client)
        .await?;
    if let Some(refresh_token) = token.refresh_token() {
        info!("Saving refresh token to system keyring...");
        save_refresh_token(refresh_token.secret())?;
    }
    Ok(token.access_token().secret().clone())
}

/// Serves exactly one request on the redirect address.
fn wait_for_redirect() -> std::io::Result<Option<String>> {
    let listener = TcpListener::bind(REDIRECT_ADDR)?;
    let Some(stream) = listener.incoming().next() else {
        return Ok(None);
    };
    let mut stream = stream?;
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line)?;
    let code = extract_code(&request_line);

    let message = if code.is_some() {
        "Login successful! You can now close this tab."
    } else {
        "Login failed. Return to the terminal and try again."
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n{}",
        message.len(),
        message
    );
    stream.write_all(response.as_bytes())?;
    Ok(code)
}

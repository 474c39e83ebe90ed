// Request router (C8) and response formatter (C10): batch command parsing,
// per-role dispatch, and the OK/ERROR wire format.
use serde::Deserialize;
use serde_json::json;

use crate::auth::Role;
use crate::diploma::DiplomaRecord;
use crate::error::AppError;
use crate::state::ServerState;

const FRAME_SEPARATOR: &str = "\r\n\r\n";
const LINE_SEPARATOR: &str = "\r\n";

/// Parses and executes one `\r\n\r\n`-framed request batch, returning the
/// complete response bytes (already `\r\n\r\n`-terminated).
pub fn handle_request(state: &ServerState, raw: &str) -> String {
    let lines: Vec<&str> = raw.split(LINE_SEPARATOR).map(str::trim).filter(|l| !l.is_empty()).collect();

    if lines.is_empty() {
        return finish(vec![format_err(&AppError::BadRequest("Empty request".to_string()))]);
    }

    let mut rest = &lines[..];
    let mut user = None;

    if let Some(first) = lines.first() {
        if first.starts_with("LOGIN ") || *first == "LOGIN" {
            rest = &lines[1..];
            match parse_login(first) {
                Ok((username, password)) => match state.authenticate(&username, &password) {
                    Ok(authenticated) => user = Some(authenticated),
                    Err(e) => return finish(vec![format_err(&e)]),
                },
                Err(e) => return finish(vec![format_err(&e)]),
            }
        }
    }

    let entries: Vec<String> = rest.iter().map(|line| dispatch(state, user.as_ref(), line)).collect();
    if entries.is_empty() {
        // A bare LOGIN with no further commands still gets an acknowledgement.
        return finish(vec![format_ok("LOGIN", &json!(user.map(|u| u.username).unwrap_or_default()))]);
    }
    finish(entries)
}

fn finish(entries: Vec<String>) -> String {
    format!("{}{}", entries.join(LINE_SEPARATOR), FRAME_SEPARATOR)
}

fn parse_login(line: &str) -> Result<(String, String), AppError> {
    let mut parts = line.split_whitespace();
    let _ = parts.next(); // "LOGIN"
    let username = parts.next().ok_or_else(|| AppError::BadRequest("LOGIN requires <user> <pass>".to_string()))?;
    let password = parts.next().ok_or_else(|| AppError::BadRequest("LOGIN requires <user> <pass>".to_string()))?;
    if parts.next().is_some() {
        return Err(AppError::BadRequest("LOGIN takes exactly two arguments".to_string()));
    }
    Ok((username.to_string(), password.to_string()))
}

fn dispatch(state: &ServerState, user: Option<&crate::auth::User>, line: &str) -> String {
    let command = line.split_whitespace().next().unwrap_or("");
    let result = match command {
        "HELP" => Ok(format_ok("HELP", &json!(help_text(user)))),
        "VIEW_BLOCK" => handle_view_block(state, line),
        "ADD_BLOCK" => require_role(user, Role::Admin).and_then(|_| handle_add_block(state, line)),
        "LIST_QUEUE" => require_role(user, Role::Admin).and_then(|_| handle_list_queue(state)),
        "MINE" => require_role(user, Role::Miner).and_then(|_| handle_mine(state, user)),
        "SUBMIT_SOLUTION" => require_role(user, Role::Miner).and_then(|_| handle_submit_solution(state, user, line)),
        "" => Err(AppError::BadRequest("Empty command".to_string())),
        other => Err(AppError::BadRequest(format!("Unknown command: {other}"))),
    };
    match result {
        Ok(entry) => entry,
        Err(e) => format_err(&e),
    }
}

fn require_role(user: Option<&crate::auth::User>, role: Role) -> Result<(), AppError> {
    match user {
        None => Err(AppError::Unauthenticated),
        Some(u) if u.role == role => Ok(()),
        Some(_) => Err(AppError::Unauthorized),
    }
}

fn handle_view_block(state: &ServerState, line: &str) -> Result<String, AppError> {
    let mut parts = line.split_whitespace();
    let _ = parts.next();
    let id_str = parts.next().ok_or_else(|| AppError::BadRequest("VIEW_BLOCK requires <id>".to_string()))?;
    let id: u64 = id_str.parse().map_err(|_| AppError::BadRequest("VIEW_BLOCK <id> must be a non-negative integer".to_string()))?;
    let block = state.view_block(id)?;
    Ok(format_ok("VIEW_BLOCK", &block.diploma_data))
}

#[derive(Deserialize)]
struct DiplomaFieldsWire {
    institution: String,
    full_name: String,
    program: String,
    qualification: String,
    specialty: String,
    issue_date: String,
    reg_number: String,
    rector_name: String,
    secretary_name: String,
}

#[derive(Deserialize)]
struct AddBlockWire {
    diploma_data: DiplomaFieldsWire,
    public_key: String,
    signature: String,
}

fn handle_add_block(state: &ServerState, line: &str) -> Result<String, AppError> {
    let (_, payload) = line
        .split_once(' ')
        .ok_or_else(|| AppError::BadRequest("ADD_BLOCK requires a JSON payload".to_string()))?;
    let wire: AddBlockWire =
        serde_json::from_str(payload).map_err(|e| AppError::BadRequest(format!("invalid ADD_BLOCK payload: {e}")))?;

    let diploma_data = DiplomaRecord {
        institution: wire.diploma_data.institution,
        full_name: wire.diploma_data.full_name,
        program: wire.diploma_data.program,
        qualification: wire.diploma_data.qualification,
        specialty: wire.diploma_data.specialty,
        issue_date: wire.diploma_data.issue_date,
        reg_number: wire.diploma_data.reg_number,
        rector_name: wire.diploma_data.rector_name,
        secretary_name: wire.diploma_data.secretary_name,
        signature: wire.signature,
    };

    let block_id = state.add_block(diploma_data, wire.public_key)?;
    Ok(format_ok("ADD_BLOCK", &json!({ "block_id": block_id })))
}

fn handle_list_queue(state: &ServerState) -> Result<String, AppError> {
    Ok(format_ok("LIST_QUEUE", &json!({ "queue_length": state.list_queue_len() })))
}

fn handle_mine(state: &ServerState, user: Option<&crate::auth::User>) -> Result<String, AppError> {
    let username = &user.expect("role checked by caller").username;
    let grant = state.mine(username)?;
    Ok(format_ok(
        "MINE",
        &json!({
            "block_id": grant.block_id,
            "nonce_start": grant.nonce_start,
            "nonce_end": grant.nonce_end,
            "info": grant.hash_info,
            "difficulty": grant.difficulty,
        }),
    ))
}

fn handle_submit_solution(state: &ServerState, user: Option<&crate::auth::User>, line: &str) -> Result<String, AppError> {
    let mut parts = line.split_whitespace();
    let _ = parts.next();
    let nonce_str = parts.next().ok_or_else(|| AppError::BadRequest("SUBMIT_SOLUTION requires <nonce> <hash>".to_string()))?;
    let hash = parts.next().ok_or_else(|| AppError::BadRequest("SUBMIT_SOLUTION requires <nonce> <hash>".to_string()))?;
    let nonce: u64 = nonce_str.parse().map_err(|_| AppError::BadRequest("<nonce> must be a non-negative integer".to_string()))?;

    let username = &user.expect("role checked by caller").username;
    let accepted = state.submit_solution(username, nonce, hash)?;
    Ok(format_ok(
        "SUBMIT_SOLUTION",
        &json!({
            "block_id": accepted.block_id,
            "prev_hash": accepted.prev_hash,
            "new_hash": accepted.new_hash,
            "reward": accepted.reward,
        }),
    ))
}

fn help_text(user: Option<&crate::auth::User>) -> String {
    let base = "AVAILABLE COMMANDS:\nVIEW_BLOCK <id> - View block by ID\nHELP - Show this message";
    match user.map(|u| u.role) {
        None => format!("{base}\nLOGIN <user> <pass> - Authenticate for more commands"),
        Some(Role::Admin) => format!("{base}\nADD_BLOCK <json_data> - Add new diploma block to the mining queue\nLIST_QUEUE - Show pending task count"),
        Some(Role::Miner) => format!("{base}\nMINE - Request a nonce range on the head task\nSUBMIT_SOLUTION <nonce> <hash> - Submit a proof-of-work solution"),
    }
}

fn format_ok(tag: &str, data: &impl serde::Serialize) -> String {
    let body = serde_json::to_string(&json!({ "data": data })).expect("response serializes");
    format!("OK {tag}\r\n{body}")
}

fn format_err(err: &AppError) -> String {
    format!("ERROR {}\r\n{err}", err.code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::genesis_prev_hash;
    use crate::chain::GenesisMaterial;
    use crate::crypto::keys::{generate_keypair, public_key_to_pem};

    fn sample_diploma(sk: &rsa::RsaPrivateKey) -> DiplomaRecord {
        let mut d = DiplomaRecord {
            institution: "State University".to_string(),
            full_name: "Ada Lovelace".to_string(),
            program: "Computer Science".to_string(),
            qualification: "Bachelor".to_string(),
            specialty: "Software Engineering".to_string(),
            issue_date: "2026-06-01".to_string(),
            reg_number: "2026-BY-0001".to_string(),
            rector_name: "I. Ivanov".to_string(),
            secretary_name: "M. Petrova".to_string(),
            signature: String::new(),
        };
        d.sign(sk).unwrap();
        d
    }

    fn test_state() -> (tempfile::TempDir, ServerState) {
        let dir = tempfile::tempdir().unwrap();
        let (sk, pk) = generate_keypair().unwrap();
        let pem = public_key_to_pem(&pk).unwrap();
        let genesis = GenesisMaterial {
            diploma_data: sample_diploma(&sk),
            public_key_pem: pem,
            difficulty: 1,
        };
        let state = ServerState::open(dir.path().to_path_buf(), Some(genesis), 1000).unwrap();
        (dir, state)
    }

    #[test]
    fn view_block_anonymous_succeeds() {
        let (_dir, state) = test_state();
        let response = handle_request(&state, "VIEW_BLOCK 0\r\n\r\n");
        assert!(response.starts_with("OK VIEW_BLOCK\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn add_block_without_login_is_unauthenticated() {
        let (_dir, state) = test_state();
        let response = handle_request(&state, "ADD_BLOCK {}\r\n\r\n");
        assert!(response.starts_with("ERROR 401"));
    }

    #[test]
    fn unknown_command_is_bad_request() {
        let (_dir, state) = test_state();
        let response = handle_request(&state, "FROBNICATE\r\n\r\n");
        assert!(response.starts_with("ERROR 400"));
    }

    #[test]
    fn view_block_out_of_range_is_not_found() {
        let (_dir, state) = test_state();
        let response = handle_request(&state, "VIEW_BLOCK 99\r\n\r\n");
        assert!(response.starts_with("ERROR 404"));
    }

    #[test]
    fn batch_entries_join_with_single_trailing_frame() {
        let (_dir, state) = test_state();
        let response = handle_request(&state, "HELP\r\nVIEW_BLOCK 0\r\n\r\n");
        assert!(response.matches("\r\n\r\n").count() == 1);
        assert!(response.contains("OK HELP\r\n"));
        assert!(response.contains("OK VIEW_BLOCK\r\n"));
    }
}

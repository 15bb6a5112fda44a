use common::{
    AccessToken, Account, Corrida, CorridaPayload, Credentials, Motorista, MotoristaPayload, RefreshRequest,
    Registration, TokenPair, Usuario, UsuarioPayload,
};
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn main() {
    // Collect all exported types
    let exports = [
        Usuario::export_to_string(),
        Motorista::export_to_string(),
        Corrida::export_to_string(),
        UsuarioPayload::export_to_string(),
        MotoristaPayload::export_to_string(),
        CorridaPayload::export_to_string(),
        Credentials::export_to_string(),
        Registration::export_to_string(),
        Account::export_to_string(),
        TokenPair::export_to_string(),
        RefreshRequest::export_to_string(),
        AccessToken::export_to_string(),
    ];

    let mut all_types = String::new();
    for export in exports {
        all_types.push_str(&export.unwrap_or_else(|e| panic!("💥 Failed to export type: {e}")));
    }
    let cleaned_types = remove_duplicate_comments(&all_types);

    // Define the output path relative to the workspace root
    let out_path = Path::new("frontend_vite/src/lib/types.ts");

    // Create the directory if it doesn't exist
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }

    fs::write(out_path, cleaned_types).unwrap();
    println!("✅ TypeScript definitions generated at: {}", out_path.display());
}

/// ts-rs prefixes every export with the same generated-file banner; keep only the first.
fn remove_duplicate_comments(content: &str) -> String {
    let mut result = Vec::new();
    let mut found_first_comment = false;

    for line in content.lines() {
        if line.trim_start().starts_with("//") {
            if !found_first_comment {
                result.push(line);
                found_first_comment = true;
            }
        } else {
            result.push(line);
        }
    }

    result.join("\n") + "\n"
}

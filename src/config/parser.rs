// KfdVault - Parseur format cle-valeur
// Format simple : sections [nom], cle = valeur, commentaires #
//
// # Format supporte
// - Sections : `[section_name]`
// - Cle-valeur : `key = value`
// - Guillemets : `key = "value with # and spaces"`
// - Commentaires : `# ligne entiere` ou `key = value # inline`
// - Valeurs sans section : section "general"
//
// # Erreurs
// Une ligne qui n'est ni une section, ni une paire, ni un commentaire
// est rejetee avec son numero de ligne (`KvError::Config`).

use crate::error::{KvError, KvResult};
use std::collections::BTreeMap;

/// Section par defaut des cles placees avant toute section.
pub const DEFAULT_SECTION: &str = "general";

/// Resultat du parsing : sections contenant des paires cle-valeur.
pub type ParsedConfig = BTreeMap<String, BTreeMap<String, String>>;

/// Parse un fichier de configuration.
pub fn parse_config(text: &str) -> KvResult<ParsedConfig> {
    let mut config = ParsedConfig::new();
    let mut section = String::from(DEFAULT_SECTION);

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| line_error(idx, "malformed section header"))?;
            section = name.to_string();
            continue;
        }

        let (key, raw) = trimmed
            .split_once('=')
            .ok_or_else(|| line_error(idx, "expected `key = value`"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(line_error(idx, "empty key"));
        }
        let value = strip_quotes(strip_inline_comment(raw.trim()));

        config
            .entry(section.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    Ok(config)
}

fn line_error(idx: usize, what: &str) -> KvError {
    KvError::Config(format!("line {}: {}", idx + 1, what))
}

/// Supprime un commentaire inline (apres #) hors guillemets.
fn strip_inline_comment(s: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return s[..i].trim_end(),
            _ => {}
        }
    }
    s
}

/// Supprime les guillemets autour d'une valeur.
fn strip_quotes(s: &str) -> &str {
    let t = s.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}

/// Valeur brute d'une cle.
pub fn get<'a>(config: &'a ParsedConfig, section: &str, key: &str) -> Option<&'a str> {
    config.get(section)?.get(key).map(String::as_str)
}

/// Parse une valeur comme u32.
pub fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

/// Parse une valeur comme u64.
pub fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

//! Interface de terminal do executor: spinners e saída colorida.
//!
//! Usa `indicatif` para o spinner enquanto uma chamada está em andamento e
//! `console` para colorir o resumo do resultado.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use serde_json::Value;

use ml_executor::DispatchResult;
use ml_executor::agent::ResourceBundle;
use ml_executor::documents::DocumentAnalysis;

/// Spinner exibido enquanto uma requisição está em andamento, mais os
/// estilos usados para relatar como ela terminou.
pub struct CallProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para sucesso.
    green: Style,
    // Estilo vermelho para falha.
    red: Style,
    // Estilo amarelo para avisos e fallbacks.
    yellow: Style,
}

impl CallProgress {
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Imprime o resultado de uma operação: o corpo JSON em caso de sucesso,
    /// a mensagem de falha caso contrário.
    pub fn dispatch(&self, operation: &str, result: &DispatchResult) {
        self.pb.finish_and_clear();
        match result {
            Ok(value) => {
                println!("  {} {operation} succeeded", self.green.apply_to("✓"));
                println!(
                    "{}",
                    serde_json::to_string_pretty(value).unwrap_or_default()
                );
            }
            Err(err) => {
                println!("  {} {operation} failed: {err}", self.red.apply_to("✗"));
            }
        }
    }

    pub fn health(&self, healthy: bool) {
        self.pb.finish_and_clear();
        if healthy {
            println!("  {} ML service is healthy", self.green.apply_to("✓"));
        } else {
            println!("  {} ML service is not reachable", self.red.apply_to("✗"));
        }
    }

    pub fn resources(&self, bundle: &ResourceBundle) {
        self.pb.finish_and_clear();
        match &bundle.note {
            Some(note) if bundle.is_fallback() => {
                println!("  {} {note}", self.yellow.apply_to("!"))
            }
            Some(note) => println!("  {note}"),
            None => {}
        }
        println!(
            "  {} {} resources",
            self.green.apply_to("✓"),
            bundle.total_count
        );
        for (format, resources) in &bundle.resources_by_format {
            for r in resources {
                println!("    [{format}] {}", describe_resource(r));
            }
        }
    }

    pub fn analysis(&self, analysis: &DocumentAnalysis) {
        self.pb.finish_and_clear();
        if analysis.fallback {
            let reason = analysis.reason.as_deref().unwrap_or("unknown reason");
            println!(
                "  {} analysis unavailable: {reason}",
                self.yellow.apply_to("!")
            );
        } else {
            println!(
                "  {} AI-generated content: {:.1}%",
                self.green.apply_to("✓"),
                analysis.ai_percentage
            );
        }
    }
}

// Recursos vêm do agente como JSON livre; objetos sem título caem no JSON bruto.
fn describe_resource(resource: &Value) -> String {
    let field = |key: &str| resource.get(key).and_then(Value::as_str);
    match (field("title"), field("url")) {
        (Some(title), Some(url)) => format!("{title} <{url}>"),
        (Some(title), None) => title.to_string(),
        _ => resource.to_string(),
    }
}

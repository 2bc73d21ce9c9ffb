use std::io;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};

/// One `.env` entry collected during first-run setup.
#[derive(Debug, Clone)]
struct Field {
    key: &'static str,
    label: &'static str,
    comment: &'static str,
    value: String,
    required: bool,
    numeric: bool,
}

fn setup_fields() -> Vec<Field> {
    vec![
        Field {
            key: "TMDB_API_KEY",
            label: "Chave da API TMDB (obrigatória)",
            comment: "Token de leitura v4: https://www.themoviedb.org/settings/api",
            value: String::new(),
            required: true,
            numeric: false,
        },
        Field {
            key: "LIVE_API_URL",
            label: "API de canais ao vivo",
            comment: "Agregador de canais e esportes",
            value: "https://playerflixapi.com/api".to_string(),
            required: false,
            numeric: false,
        },
        Field {
            key: "DATABASE_URL",
            label: "Banco de dados (SQLite)",
            comment: "Caminho do banco local",
            value: "sqlite://./meucinema.db?mode=rwc".to_string(),
            required: false,
            numeric: false,
        },
        Field {
            key: "PORT",
            label: "Porta do servidor",
            comment: "Padrão 3000",
            value: "3000".to_string(),
            required: false,
            numeric: true,
        },
    ]
}

/// Runs the interactive setup once, when no TMDB key is in the environment,
/// and persists the answers to `.env`.
pub fn maybe_run_onboarding() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    if std::env::var("TMDB_API_KEY").is_ok() {
        return Ok(());
    }

    let fields = run_setup()?;
    write_env_file(&fields)?;

    for field in &fields {
        std::env::set_var(field.key, &field.value);
    }

    Ok(())
}

fn run_setup() -> anyhow::Result<Vec<Field>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut fields = setup_fields();
    let mut cursor = 0usize;

    let result = (|| -> anyhow::Result<Vec<Field>> {
        loop {
            terminal.draw(|f| render_setup(f, &fields, cursor))?;

            if let Event::Key(key) = event::read()? {
                match apply_key(&mut fields, &mut cursor, key) {
                    Outcome::Continue => {}
                    Outcome::Save if all_complete(&fields) => return Ok(fields),
                    Outcome::Save => {}
                    Outcome::Quit => return Err(anyhow::anyhow!("Configuração cancelada")),
                }
            }
        }
    })();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

enum Outcome {
    Continue,
    Save,
    Quit,
}

fn apply_key(fields: &mut [Field], cursor: &mut usize, key: KeyEvent) -> Outcome {
    let last = fields.len() - 1;

    match key.code {
        KeyCode::Esc => Outcome::Quit,
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => Outcome::Save,
        KeyCode::Enter => {
            if *cursor < last {
                *cursor += 1;
                Outcome::Continue
            } else {
                Outcome::Save
            }
        }
        KeyCode::Tab | KeyCode::Down => {
            if *cursor < last {
                *cursor += 1;
            }
            Outcome::Continue
        }
        KeyCode::Up => {
            *cursor = cursor.saturating_sub(1);
            Outcome::Continue
        }
        KeyCode::Backspace => {
            fields[*cursor].value.pop();
            Outcome::Continue
        }
        KeyCode::Char(c) => {
            let field = &mut fields[*cursor];
            if !field.numeric || c.is_ascii_digit() {
                field.value.push(c);
            }
            Outcome::Continue
        }
        _ => Outcome::Continue,
    }
}

fn all_complete(fields: &[Field]) -> bool {
    fields
        .iter()
        .all(|field| !field.required || !field.value.trim().is_empty())
}

fn write_env_file(fields: &[Field]) -> anyhow::Result<()> {
    let mut contents = String::new();

    for field in fields {
        contents.push_str(&format!("# {}\n", field.comment));
        contents.push_str(&format!("{}={}\n\n", field.key, field.value.trim()));
    }

    std::fs::write(".env", contents)?;
    Ok(())
}

fn render_setup(f: &mut ratatui::Frame, fields: &[Field], cursor: usize) {
    let mut constraints = vec![Constraint::Length(3), Constraint::Length(4)];
    constraints.extend(fields.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Length(3));

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(constraints)
        .split(f.size());

    let title = Paragraph::new(Line::from(vec![Span::styled(
        "Meu Cinema — Configuração inicial",
        Style::default().add_modifier(Modifier::BOLD),
    )]))
    .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(title, layout[0]);

    let intro = Paragraph::new(vec![
        Line::from("Este assistente roda uma vez e grava um arquivo .env."),
        Line::from("Controles: Enter/Tab próximo, Up anterior, Ctrl+S salvar, Esc sair."),
    ]);
    f.render_widget(intro, layout[1]);

    for (index, field) in fields.iter().enumerate() {
        render_field(f, layout[2 + index], field, index == cursor);
    }

    let ready = all_complete(fields);
    let status = Paragraph::new(Line::from(vec![Span::styled(
        if ready {
            "Pronto para salvar"
        } else {
            "Informe a chave da API TMDB"
        },
        Style::default().fg(if ready { Color::Green } else { Color::Red }),
    )]))
    .block(Block::default().borders(Borders::TOP));
    f.render_widget(status, layout[2 + fields.len()]);
}

fn render_field(f: &mut ratatui::Frame, area: Rect, field: &Field, active: bool) {
    let title = if active {
        format!("{} (editando)", field.label)
    } else {
        field.label.to_string()
    };

    let style = if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style);
    f.render_widget(Paragraph::new(field.value.as_str()).block(block).style(style), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn required_field_gates_completion() {
        let mut fields = setup_fields();
        assert!(!all_complete(&fields));

        fields[0].value = "token".to_string();
        assert!(all_complete(&fields));
    }

    #[test]
    fn numeric_field_ignores_letters() {
        let mut fields = setup_fields();
        let mut cursor = fields.len() - 1;

        apply_key(&mut fields, &mut cursor, key(KeyCode::Char('x')));
        apply_key(&mut fields, &mut cursor, key(KeyCode::Char('8')));

        assert_eq!(fields[cursor].value, "30008");
    }

    #[test]
    fn enter_walks_fields_then_saves() {
        let mut fields = setup_fields();
        let mut cursor = 0;

        for _ in 0..fields.len() - 1 {
            assert!(matches!(
                apply_key(&mut fields, &mut cursor, key(KeyCode::Enter)),
                Outcome::Continue
            ));
        }
        assert!(matches!(
            apply_key(&mut fields, &mut cursor, key(KeyCode::Enter)),
            Outcome::Save
        ));
    }
}

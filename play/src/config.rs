use dotenv::var;
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The software controller, printing the final screen.
    Sim,
    /// A display wired to the pins of a gpiod chip.
    Gpiod,
}

impl FromStr for Backend {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sim" => Ok(Backend::Sim),
            "gpiod" => Ok(Backend::Gpiod),
            _ => Err(eyre!("Unknown backend {:?}, expected sim or gpiod", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    Redraw,
    Shift,
}

impl FromStr for ScrollMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redraw" => Ok(ScrollMode::Redraw),
            "shift" => Ok(ScrollMode::Shift),
            _ => Err(eyre!("Unknown scroll mode {:?}, expected redraw or shift", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PlayConfig {
    pub backend: Backend,
    pub chip: String,
    pub pin_e: usize,
    pub pin_rw: Option<usize>,
    pub pin_rs: usize,
    pub pin_bl: Option<usize>,
    /// D4..D7 for a 4-bit bus, D0..D7 for an 8-bit one.
    pub pins_data: Vec<usize>,
    pub bus_width: u8,
    pub layout: String,
    pub scroll: ScrollMode,
    /// Seconds without output before the backlight goes off.
    pub backlight_timeout: u64,
}

impl PlayConfig {
    /// `$LCD_CONFIG_FILE`, or `lcd.json`.
    fn path() -> String {
        config_path(var("LCD_CONFIG_FILE").ok())
    }

    pub fn try_load() -> Option<Self> {
        let config_str = Self::path();
        let config_path = Path::new(&config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let file = std::fs::File::create(Self::path())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Overrides fields from the `LCD_*` environment variables.
    pub fn apply_env(&mut self) -> eyre::Result<()> {
        self.apply_overrides(|name| var(name).ok())
    }

    /// Overrides fields with whatever `lookup` finds for their variable names.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<()> {
        if let Some(backend) = lookup("LCD_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(chip) = lookup("LCD_CHIP") {
            self.chip = chip;
        }
        if let Some(pin) = lookup("LCD_PIN_E") {
            self.pin_e = pin.trim().parse()?;
        }
        if let Some(pin) = lookup("LCD_PIN_RW") {
            self.pin_rw = parse_optional_pin(&pin)?;
        }
        if let Some(pin) = lookup("LCD_PIN_RS") {
            self.pin_rs = pin.trim().parse()?;
        }
        if let Some(pin) = lookup("LCD_PIN_BL") {
            self.pin_bl = parse_optional_pin(&pin)?;
        }
        if let Some(pins) = lookup("LCD_PINS_DATA") {
            self.pins_data = parse_pin_bus(&pins)?;
        }
        if let Some(width) = lookup("LCD_BUS_WIDTH") {
            self.bus_width = width.trim().parse()?;
        }
        if let Some(layout) = lookup("LCD_LAYOUT") {
            self.layout = layout.trim().to_string();
        }
        if let Some(scroll) = lookup("LCD_SCROLL") {
            self.scroll = scroll.parse()?;
        }
        if let Some(timeout) = lookup("LCD_BACKLIGHT_TIMEOUT") {
            self.backlight_timeout = timeout.trim().parse()?;
        }
        Ok(())
    }
}

impl Default for PlayConfig {
    fn default() -> Self {
        PlayConfig {
            backend: Backend::Sim,
            chip: "/dev/gpiochip0".to_string(),
            pin_e: 17,
            pin_rw: Some(27),
            pin_rs: 22,
            pin_bl: None,
            pins_data: vec![26, 16, 20, 21],
            bus_width: 4,
            layout: "20x4".to_string(),
            scroll: ScrollMode::Redraw,
            backlight_timeout: 60,
        }
    }
}

fn config_path(configured: Option<String>) -> String {
    configured
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| "lcd.json".to_string())
}

/// Parses a list of pin numbers separated by commas, spaces or semicolons.
pub fn parse_pin_bus(pin_str: &str) -> eyre::Result<Vec<usize>> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?;
    if pins.len() != 4 && pins.len() != 8 {
        return Err(eyre!("Invalid number of data pins: {}", pins.len()));
    }
    Ok(pins)
}

/// An empty value or `none` means the line isn't wired.
fn parse_optional_pin(pin_str: &str) -> eyre::Result<Option<usize>> {
    let pin_str = pin_str.trim();
    if pin_str.is_empty() || pin_str.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(pin_str.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn pin_bus_separators() {
        assert_eq!(parse_pin_bus("26, 16;20 21").unwrap(), [26, 16, 20, 21]);
        assert_eq!(parse_pin_bus("0,1,2,3,4,5,6,7").unwrap().len(), 8);
        assert!(parse_pin_bus("1,2,3").is_err());
        assert!(parse_pin_bus("1,2,x,4").is_err());
    }

    #[test]
    fn environment_overrides_single_fields() {
        let vars = HashMap::from([
            ("LCD_BACKEND", "GPIOD"),
            ("LCD_PIN_RW", "none"),
            ("LCD_PIN_BL", "18"),
            ("LCD_PINS_DATA", "5,6,13,19"),
            ("LCD_SCROLL", "shift"),
            ("LCD_BACKLIGHT_TIMEOUT", "5"),
        ]);
        let mut config = PlayConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.backend, Backend::Gpiod);
        assert_eq!(config.pin_rw, None);
        assert_eq!(config.pin_bl, Some(18));
        assert_eq!(config.pins_data, [5, 6, 13, 19]);
        assert_eq!(config.scroll, ScrollMode::Shift);
        assert_eq!(config.backlight_timeout, 5);
        assert_eq!(config.pin_e, PlayConfig::default().pin_e);
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = PlayConfig::default();
        assert!(
            config
                .apply_overrides(|name| (name == "LCD_SCROLL").then(|| "sideways".to_string()))
                .is_err()
        );
    }

    #[test]
    fn load_and_save_share_the_config_path() {
        assert_eq!(config_path(None), "lcd.json");
        assert_eq!(config_path(Some(" ".to_string())), "lcd.json");
        assert_eq!(config_path(Some("/etc/lcd.json".to_string())), "/etc/lcd.json");
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let config: PlayConfig =
            serde_json::from_str(r#"{"backend": "gpiod", "layout": "16x2"}"#).unwrap();
        assert_eq!(config.backend, Backend::Gpiod);
        assert_eq!(config.layout, "16x2");
        assert_eq!(config.bus_width, 4);
        assert_eq!(config.scroll, ScrollMode::Redraw);
    }
}

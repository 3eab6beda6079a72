#[cfg(test)]
#[path = "slash_commands_test.rs"]
mod tests;

pub struct SlashCommand {
    command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let mut args = text
            .split_whitespace()
            .map(|e| return e.to_string())
            .collect::<Vec<String>>();
        if args.is_empty() {
            return None;
        }

        let prefix = args.remove(0);
        let cmd = SlashCommand {
            command: prefix,
            args,
        };
        if cmd.is_quit()
            || cmd.is_help()
            || cmd.is_clear()
            || cmd.is_search()
            || cmd.is_key()
            || cmd.is_columns()
        {
            return Some(cmd);
        }

        return None;
    }

    pub fn is_quit(&self) -> bool {
        return ["/q", "/quit", "/exit"].contains(&self.command.as_str());
    }

    pub fn is_help(&self) -> bool {
        return ["/h", "/help"].contains(&self.command.as_str());
    }

    pub fn is_clear(&self) -> bool {
        return ["/c", "/clear"].contains(&self.command.as_str());
    }

    pub fn is_search(&self) -> bool {
        return ["/s", "/search"].contains(&self.command.as_str());
    }

    pub fn is_key(&self) -> bool {
        return ["/k", "/key"].contains(&self.command.as_str());
    }

    pub fn is_columns(&self) -> bool {
        return ["/ls", "/columns"].contains(&self.command.as_str());
    }

    /// Parses the `on`/`off` argument of `/search`.
    pub fn toggle_arg(&self) -> Option<bool> {
        match self.args.first().map(|arg| return arg.to_lowercase()) {
            Some(arg) if ["on", "true", "enable", "1"].contains(&arg.as_str()) => {
                return Some(true);
            }
            Some(arg) if ["off", "false", "disable", "0"].contains(&arg.as_str()) => {
                return Some(false);
            }
            _ => return None,
        }
    }

    /// Splits `/key NAME VALUE` where NAME may contain spaces, such as
    /// `GEMINI API Key`. The secret is always the last argument.
    pub fn key_args(&self) -> Option<(String, String)> {
        if self.args.len() < 2 {
            return None;
        }

        let value = self.args[self.args.len() - 1].to_string();
        let name = self.args[..self.args.len() - 1].join(" ");

        return Some((name, value));
    }
}

use crate::rtree::node::RecordHandle;
use crate::rtree::rectangle::Rectangle;
use std::path::PathBuf;
use thiserror::Error;

/// 命令解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}', type HELP for the command list")]
    Unknown(String),

    #[error("wrong number of arguments for '{command}' command. Expected {expected}, got {got}")]
    WrongArity {
        command: &'static str,
        expected: String,
        got: usize,
    },

    #[error("invalid {name}: '{value}'")]
    InvalidArgument { name: &'static str, value: String },
}

/// 交互命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// INSERT block slot minx miny maxx maxy
    Insert { mbr: Rectangle, handle: RecordHandle },
    /// DELETE minx miny maxx maxy
    Delete(Rectangle),
    /// RANGE minx miny maxx maxy
    Range(Rectangle),
    /// KNN x y k
    Knn { x: f64, y: f64, k: usize },
    Skyline,
    /// IMPORT path.geojson
    Import(PathBuf),
    /// GET block slot
    Get(RecordHandle),
    Stats,
    Check,
    /// DUMP [JSON]
    Dump { json: bool },
    Help,
    Quit,
}

impl Command {
    /// 由已切分的参数解析命令，命令名不区分大小写
    pub fn parse(parts: &[String]) -> Result<Command, CommandError> {
        let (name, args) = parts.split_first().ok_or(CommandError::Empty)?;
        let args = ArgumentParser::new(args);

        match name.to_uppercase().as_str() {
            "INSERT" => {
                args.check_arg_count("INSERT", 6)?;
                let handle = RecordHandle::new(
                    args.get_u32(0, "block id")?,
                    args.get_u32(1, "slot")?,
                );
                let mbr = args.get_rectangle(2)?;
                Ok(Command::Insert { mbr, handle })
            }
            "DELETE" => {
                args.check_arg_count("DELETE", 4)?;
                Ok(Command::Delete(args.get_rectangle(0)?))
            }
            "RANGE" => {
                args.check_arg_count("RANGE", 4)?;
                Ok(Command::Range(args.get_rectangle(0)?))
            }
            "KNN" => {
                args.check_arg_count("KNN", 3)?;
                Ok(Command::Knn {
                    x: args.get_f64(0, "x")?,
                    y: args.get_f64(1, "y")?,
                    k: args.get_usize(2, "k")?,
                })
            }
            "SKYLINE" => args.no_args("SKYLINE", Command::Skyline),
            "IMPORT" => {
                args.check_arg_count("IMPORT", 1)?;
                Ok(Command::Import(PathBuf::from(&args.args[0])))
            }
            "GET" => {
                args.check_arg_count("GET", 2)?;
                Ok(Command::Get(RecordHandle::new(
                    args.get_u32(0, "block id")?,
                    args.get_u32(1, "slot")?,
                )))
            }
            "STATS" => args.no_args("STATS", Command::Stats),
            "CHECK" => args.no_args("CHECK", Command::Check),
            "DUMP" => match args.args {
                [] => Ok(Command::Dump { json: false }),
                [format] if format.eq_ignore_ascii_case("json") => Ok(Command::Dump { json: true }),
                [format] => Err(CommandError::InvalidArgument {
                    name: "dump format",
                    value: format.clone(),
                }),
                _ => Err(CommandError::WrongArity {
                    command: "DUMP",
                    expected: "0 or 1".to_string(),
                    got: args.args.len(),
                }),
            },
            "HELP" => Ok(Command::Help),
            "QUIT" | "EXIT" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// 解析一行输入：过滤控制字符后按空白切分
    pub fn parse_line(line: &str) -> Result<Command, CommandError> {
        let cleaned: String = line
            .chars()
            .filter(|&c| c.is_ascii_graphic() || c == ' ' || c == '\t')
            .collect();
        let parts: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();
        Self::parse(&parts)
    }
}

/// 参数解析工具
struct ArgumentParser<'a> {
    args: &'a [String],
}

impl<'a> ArgumentParser<'a> {
    fn new(args: &'a [String]) -> Self {
        Self { args }
    }

    fn check_arg_count(&self, command: &'static str, expected: usize) -> Result<(), CommandError> {
        if self.args.len() != expected {
            return Err(CommandError::WrongArity {
                command,
                expected: expected.to_string(),
                got: self.args.len(),
            });
        }
        Ok(())
    }

    fn no_args(&self, command: &'static str, parsed: Command) -> Result<Command, CommandError> {
        self.check_arg_count(command, 0)?;
        Ok(parsed)
    }

    fn get_f64(&self, index: usize, name: &'static str) -> Result<f64, CommandError> {
        self.parse_at(index, name)
    }

    fn get_u32(&self, index: usize, name: &'static str) -> Result<u32, CommandError> {
        self.parse_at(index, name)
    }

    fn get_usize(&self, index: usize, name: &'static str) -> Result<usize, CommandError> {
        self.parse_at(index, name)
    }

    /// 从 `index` 开始读四个坐标；边界合法性交给树检查
    fn get_rectangle(&self, index: usize) -> Result<Rectangle, CommandError> {
        Ok(Rectangle::new(
            self.get_f64(index, "min x")?,
            self.get_f64(index + 1, "min y")?,
            self.get_f64(index + 2, "max x")?,
            self.get_f64(index + 3, "max y")?,
        ))
    }

    fn parse_at<T: std::str::FromStr>(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<T, CommandError> {
        let value = &self.args[index];
        value.parse().map_err(|_| CommandError::InvalidArgument {
            name,
            value: value.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_insert() {
        let command = Command::parse_line("insert 1 7 0 0 2.5 3").unwrap();
        assert_eq!(
            command,
            Command::Insert {
                mbr: Rectangle::new(0.0, 0.0, 2.5, 3.0),
                handle: RecordHandle::new(1, 7),
            }
        );
    }

    #[test]
    fn test_parse_queries() {
        assert_eq!(
            Command::parse_line("RANGE 0 0 6 6").unwrap(),
            Command::Range(Rectangle::new(0.0, 0.0, 6.0, 6.0))
        );
        assert_eq!(
            Command::parse_line("DELETE 5 5 5 5").unwrap(),
            Command::Delete(Rectangle::from_point(5.0, 5.0))
        );
        assert_eq!(
            Command::parse_line("KNN 1.5 -2 3").unwrap(),
            Command::Knn {
                x: 1.5,
                y: -2.0,
                k: 3
            }
        );
        assert_eq!(Command::parse_line("skyline").unwrap(), Command::Skyline);
        assert_eq!(
            Command::parse_line("GET 2 0").unwrap(),
            Command::Get(RecordHandle::new(2, 0))
        );
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(
            Command::parse_line("IMPORT cities.geojson").unwrap(),
            Command::Import(PathBuf::from("cities.geojson"))
        );
        assert_eq!(
            Command::parse_line("DUMP").unwrap(),
            Command::Dump { json: false }
        );
        assert_eq!(
            Command::parse_line("dump json").unwrap(),
            Command::Dump { json: true }
        );
        assert_eq!(Command::parse_line("exit").unwrap(), Command::Quit);
        assert_eq!(Command::parse_line("STATS").unwrap(), Command::Stats);
        assert_eq!(Command::parse_line("CHECK").unwrap(), Command::Check);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse_line("   "), Err(CommandError::Empty));
        assert!(matches!(
            Command::parse_line("FLY 1 2"),
            Err(CommandError::Unknown(name)) if name == "FLY"
        ));
        assert!(matches!(
            Command::parse_line("RANGE 0 0 1"),
            Err(CommandError::WrongArity { got: 3, .. })
        ));
        assert!(matches!(
            Command::parse_line("KNN 0 0 -1"),
            Err(CommandError::InvalidArgument { name: "k", .. })
        ));
        assert!(matches!(
            Command::parse_line("STATS now"),
            Err(CommandError::WrongArity { command: "STATS", .. })
        ));
        assert_eq!(
            Command::parse_line("INSERT 1 0 0 0 1"),
            Err(CommandError::WrongArity {
                command: "INSERT",
                expected: "6".to_string(),
                got: 5,
            })
        );
        assert_eq!(
            Command::parse_line("DUMP json tree"),
            Err(CommandError::WrongArity {
                command: "DUMP",
                expected: "0 or 1".to_string(),
                got: 2,
            })
        );
        assert!(matches!(
            Command::parse_line("DUMP xml"),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_non_finite_coordinates_pass_through() {
        // NaN 能被解析，由树以 InvalidMbr 拒绝
        let command = Command::parse_line("RANGE NaN 0 1 1").unwrap();
        match command {
            Command::Range(rect) => assert!(!rect.is_valid()),
            other => panic!("unexpected command {:?}", other),
        }
    }
}

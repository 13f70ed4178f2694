//! Display and Debug implementations for Value
//!
//! Both walk the value graph, printing `<cycle>` when they reach a heap
//! value that is already being printed further up.

use std::fmt;

use super::*;

struct Printer<'a> {
    value: &'a Value,
    debug: bool,
}

fn print(
    value: &Value,
    f: &mut fmt::Formatter<'_>,
    debug: bool,
    stack: &mut Vec<usize>,
) -> fmt::Result {
    if let Some(identity) = value.identity() {
        if stack.contains(&identity) {
            return write!(f, "<cycle>");
        }
        stack.push(identity);
        let result = print_inner(value, f, debug, stack);
        stack.pop();
        return result;
    }
    print_inner(value, f, debug, stack)
}

fn print_inner(
    value: &Value,
    f: &mut fmt::Formatter<'_>,
    debug: bool,
    stack: &mut Vec<usize>,
) -> fmt::Result {
    match value {
        Value::Undefined => write!(f, "undefined"),
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{}", b),
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(n) => write!(f, "{:?}", n),
        Value::String(s) if debug => write!(f, "{:?}", s.as_ref()),
        Value::String(s) => write!(f, "{}", s),

        Value::Array(items) => {
            let items = items.read().clone();
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                print(item, f, true, stack)?;
            }
            write!(f, "]")
        }

        Value::Map(map) => {
            let entries: Vec<(Value, Value)> = map
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            write!(f, "Map {{")?;
            for (i, (k, v)) in entries.iter().enumerate() {
                write!(f, "{}", if i > 0 { ", " } else { " " })?;
                print(k, f, true, stack)?;
                write!(f, " => ")?;
                print(v, f, true, stack)?;
            }
            write!(f, "{}}}", if entries.is_empty() { "" } else { " " })
        }

        Value::Set(set) => {
            let members: Vec<Value> = set.read().iter().cloned().collect();
            write!(f, "Set {{")?;
            for (i, member) in members.iter().enumerate() {
                write!(f, "{}", if i > 0 { ", " } else { " " })?;
                print(member, f, true, stack)?;
            }
            write!(f, "{}}}", if members.is_empty() { "" } else { " " })
        }

        Value::Object(obj) => {
            let obj = obj.read().clone();
            if let Some(constructor) = &obj.constructor {
                write!(f, "<{}> ", constructor)?;
            }
            write!(f, "{{")?;
            for (i, (name, v)) in obj.fields.iter().enumerate() {
                write!(f, "{}{}: ", if i > 0 { ", " } else { " " }, name)?;
                print(v, f, true, stack)?;
            }
            write!(f, "{}}}", if obj.fields.is_empty() { "" } else { " " })
        }

        Value::Reactive(r) => {
            write!(f, "{}(", r.variant().as_str())?;
            print(&r.unwrap(), f, true, stack)?;
            write!(f, ")")
        }

        Value::Thunk(t) => write!(f, "<thunk {}>", t.locator()),
        Value::Function(func) => write!(f, "<fn {}>", func.name()),
        Value::Custom(c) => write!(f, "{:?}", c),
        Value::Unresolvable(diagnostic) => write!(f, "<unresolvable: {}>", diagnostic),
    }
}

impl fmt::Display for Printer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        print(self.value, f, self.debug, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printer = Printer {
            value: self,
            debug: true,
        };
        fmt::Display::fmt(&printer, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display drops the quotes around a top-level string
        let printer = Printer {
            value: self,
            debug: false,
        };
        fmt::Display::fmt(&printer, f)
    }
}

impl fmt::Debug for ReactiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Value::Reactive(self.clone()), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_quotes_strings() {
        assert_eq!(format!("{:?}", Value::string("hi")), "\"hi\"");
        assert_eq!(format!("{}", Value::string("hi")), "hi");
    }

    #[test]
    fn test_debug_containers() {
        let v = Value::array(vec![Value::Int(1), Value::Float(2.0), Value::Null]);
        assert_eq!(format!("{:?}", v), "[1, 2.0, null]");

        let obj = Value::object(ObjectValue::new().with_field("a", Value::string("x")));
        assert_eq!(format!("{:?}", obj), "{ a: \"x\" }");
    }

    #[test]
    fn test_debug_marks_cycles() {
        let items = Value::array(vec![Value::Int(1)]);
        if let Value::Array(a) = &items {
            a.write().push(items.clone());
        }
        assert_eq!(format!("{:?}", items), "[1, <cycle>]");
    }

    #[test]
    fn test_debug_reactive() {
        assert_eq!(format!("{:?}", Value::signal(Value::Int(5))), "signal(5)");
    }
}
